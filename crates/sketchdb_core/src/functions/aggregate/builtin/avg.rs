use sketchdb_error::{DbError, Result};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::functions::aggregate::AggregateFunction;
use crate::functions::bind_state::BindState;

#[derive(Debug, Clone, Copy)]
pub struct Avg;

#[derive(Debug, Default)]
pub struct AvgState {
    sum: f64,
    count: i64,
}

impl AggregateFunction for Avg {
    const NAME: &'static str = "avg";

    type BindState = ();
    type GroupState = AvgState;

    fn bind(
        &self,
        inputs: Vec<Expression>,
        _config: &ExecutionConfig,
    ) -> Result<BindState<Self::BindState>> {
        if inputs.len() != 1 {
            return Err(
                DbError::new("avg expects one argument").with_field("got", inputs.len())
            );
        }

        Ok(BindState {
            state: (),
            return_type: DataType::Float64,
            inputs,
        })
    }

    fn create(_state: &Self::BindState) -> Result<Self::GroupState> {
        Ok(AvgState::default())
    }

    fn iterate(
        _state: &Self::BindState,
        value: &ScalarValue,
        group: &mut Self::GroupState,
    ) -> Result<()> {
        group.sum += value.try_as_f64()?;
        group.count += 1;
        Ok(())
    }

    fn combine(
        _state: &Self::BindState,
        target: &mut Self::GroupState,
        source: Self::GroupState,
    ) -> Result<()> {
        target.sum += source.sum;
        target.count += source.count;
        Ok(())
    }

    fn result(_state: &Self::BindState, group: &Self::GroupState) -> Result<ScalarValue> {
        if group.count == 0 {
            return Ok(ScalarValue::Null);
        }
        Ok(ScalarValue::Float64(group.sum / group.count as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::row::Row;
    use crate::expr::column;
    use crate::functions::aggregate::bind_aggregate;

    #[test]
    fn avg_basic() {
        let agg = bind_aggregate(
            Avg,
            vec![column("a", DataType::Int64)],
            &ExecutionConfig::default(),
        )
        .unwrap();

        let mut state = agg.create().unwrap();
        assert_eq!(ScalarValue::Null, agg.result(&state).unwrap());

        for v in [1_i64, 2, 6] {
            agg.update(&Row::new().with_field("a", v), &mut state)
                .unwrap();
        }
        assert_eq!(ScalarValue::Float64(3.0), agg.result(&state).unwrap());
    }
}
