use sketchdb_error::{DbError, Result};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::functions::aggregate::AggregateFunction;
use crate::functions::bind_state::BindState;

/// Count non-null values, or all rows when there's no input.
#[derive(Debug, Clone, Copy)]
pub struct Count;

impl AggregateFunction for Count {
    const NAME: &'static str = "count";

    type BindState = ();
    type GroupState = i64;

    fn bind(
        &self,
        inputs: Vec<Expression>,
        _config: &ExecutionConfig,
    ) -> Result<BindState<Self::BindState>> {
        if inputs.len() > 1 {
            return Err(
                DbError::new("count expects at most one argument").with_field("got", inputs.len())
            );
        }

        Ok(BindState {
            state: (),
            return_type: DataType::Int64,
            inputs,
        })
    }

    fn create(_state: &Self::BindState) -> Result<Self::GroupState> {
        Ok(0)
    }

    fn iterate(
        _state: &Self::BindState,
        _value: &ScalarValue,
        group: &mut Self::GroupState,
    ) -> Result<()> {
        *group += 1;
        Ok(())
    }

    fn combine(
        _state: &Self::BindState,
        target: &mut Self::GroupState,
        source: Self::GroupState,
    ) -> Result<()> {
        *target += source;
        Ok(())
    }

    fn result(_state: &Self::BindState, group: &Self::GroupState) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(*group))
    }
}
