use sketchdb_error::{DbError, Result};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::functions::aggregate::AggregateFunction;
use crate::functions::bind_state::BindState;

#[derive(Debug, Clone, Copy)]
pub struct Sum;

#[derive(Debug)]
pub struct SumBindState {
    /// If the input is an integer type. Integers are summed as i64, everything
    /// else as f64.
    integer: bool,
}

#[derive(Debug, Default)]
pub struct SumState {
    int: i64,
    float: f64,
    valid: bool,
}

impl AggregateFunction for Sum {
    const NAME: &'static str = "sum";

    type BindState = SumBindState;
    type GroupState = SumState;

    fn bind(
        &self,
        inputs: Vec<Expression>,
        _config: &ExecutionConfig,
    ) -> Result<BindState<Self::BindState>> {
        if inputs.len() != 1 {
            return Err(
                DbError::new("sum expects one argument").with_field("got", inputs.len())
            );
        }

        let datatype = inputs[0].datatype();
        let (integer, return_type) = if datatype.is_integer() {
            (true, DataType::Int64)
        } else if datatype.is_float() || datatype == DataType::Undefined {
            (false, DataType::Float64)
        } else {
            return Err(DbError::type_error(format!(
                "unexpected type for sum: {datatype}"
            )));
        };

        Ok(BindState {
            state: SumBindState { integer },
            return_type,
            inputs,
        })
    }

    fn create(_state: &Self::BindState) -> Result<Self::GroupState> {
        Ok(SumState::default())
    }

    fn iterate(
        state: &Self::BindState,
        value: &ScalarValue,
        group: &mut Self::GroupState,
    ) -> Result<()> {
        if state.integer {
            let v = value.try_as_i64()?;
            group.int = group
                .int
                .checked_add(v)
                .ok_or_else(|| DbError::new("Integer overflow in sum"))?;
        } else {
            group.float += value.try_as_f64()?;
        }
        group.valid = true;
        Ok(())
    }

    fn combine(
        _state: &Self::BindState,
        target: &mut Self::GroupState,
        source: Self::GroupState,
    ) -> Result<()> {
        target.int = target
            .int
            .checked_add(source.int)
            .ok_or_else(|| DbError::new("Integer overflow in sum"))?;
        target.float += source.float;
        target.valid |= source.valid;
        Ok(())
    }

    fn result(state: &Self::BindState, group: &Self::GroupState) -> Result<ScalarValue> {
        if !group.valid {
            return Ok(ScalarValue::Null);
        }
        Ok(if state.integer {
            ScalarValue::Int64(group.int)
        } else {
            ScalarValue::Float64(group.float)
        })
    }
}
