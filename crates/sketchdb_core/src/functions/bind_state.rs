use crate::arrays::datatype::DataType;
use crate::expr::Expression;

/// Bind state for an aggregate function. Parameterized on the function state.
#[derive(Debug)]
pub struct BindState<S> {
    pub state: S,
    pub return_type: DataType,
    /// Inputs evaluated per row. Arguments consumed during binding (constant
    /// configuration of the function) are not included.
    pub inputs: Vec<Expression>,
}
