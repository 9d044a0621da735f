use sketchdb_error::{DbError, Result};
use tracing::trace;

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::functions::aggregate::AggregateFunction;
use crate::functions::bind_state::BindState;
use crate::optimizer::expr_rewrite::ExpressionRewriteRule;
use crate::optimizer::expr_rewrite::const_fold::ConstFold;
use crate::statistics::tdigest::TDigest;

/// Compute an approximate percentile using a t-digest.
///
/// Arguments are `(percentile, value)`. The percentile must fold to a
/// constant in [0, 100].
#[derive(Debug, Clone, Copy)]
pub struct ApproxPercentile;

#[derive(Debug)]
pub struct ApproxPercentileBindState {
    /// Percentile as provided, not yet validated.
    percentile: f64,
    compression: usize,
}

#[derive(Debug)]
pub struct ApproxPercentileState {
    digest: TDigest,
    /// Number of values folded into the digest.
    count: u64,
    /// Percentile normalized to [0, 1].
    quantile: f64,
}

impl AggregateFunction for ApproxPercentile {
    const NAME: &'static str = "approx_percentile";

    type BindState = ApproxPercentileBindState;
    type GroupState = ApproxPercentileState;

    fn bind(
        &self,
        inputs: Vec<Expression>,
        config: &ExecutionConfig,
    ) -> Result<BindState<Self::BindState>> {
        let [percentile, value]: [Expression; 2] = inputs.try_into().map_err(|inputs: Vec<_>| {
            DbError::new("approx_percentile expects two arguments")
                .with_field("got", inputs.len())
        })?;

        let percentile = ConstFold::rewrite(percentile)?
            .try_into_scalar()?
            .try_as_f64()?;

        Ok(BindState {
            state: ApproxPercentileBindState {
                percentile,
                compression: config.approx_percentile_compression as usize,
            },
            return_type: DataType::Float64,
            inputs: vec![value],
        })
    }

    fn create(state: &Self::BindState) -> Result<Self::GroupState> {
        let percentile = state.percentile;
        if !(0.0..=100.0).contains(&percentile) {
            return Err(DbError::range(format!(
                "percentile should be in [0,100] in approx_percentile aggregation, got [{percentile:?}]"
            ))
            .with_field("percentile", percentile));
        }

        trace!(percentile, compression = state.compression, "creating approx_percentile state");

        Ok(ApproxPercentileState {
            digest: TDigest::try_new(state.compression)?,
            count: 0,
            quantile: percentile / 100.0,
        })
    }

    fn iterate(
        _state: &Self::BindState,
        value: &ScalarValue,
        group: &mut Self::GroupState,
    ) -> Result<()> {
        group.digest.add(value.try_as_f64()?)?;
        group.count += 1;
        Ok(())
    }

    fn combine(
        _state: &Self::BindState,
        target: &mut Self::GroupState,
        source: Self::GroupState,
    ) -> Result<()> {
        target.digest.merge(&source.digest)?;
        target.count += source.count;
        Ok(())
    }

    fn result(_state: &Self::BindState, group: &Self::GroupState) -> Result<ScalarValue> {
        if group.count == 0 {
            return Ok(ScalarValue::Null);
        }
        Ok(group.digest.quantile(group.quantile).into())
    }
}
