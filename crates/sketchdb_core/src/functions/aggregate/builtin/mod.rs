pub mod approx_percentile;
pub mod avg;
pub mod count;
pub mod sum;

use approx_percentile::ApproxPercentile;
use avg::Avg;
use count::Count;
use sketchdb_error::{DbError, Result};
use sum::Sum;

use super::bind_aggregate;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::expr::aggregate_expr::AggregateExpr;

/// Names of all builtin aggregates.
pub const BUILTIN_AGGREGATES: &[&str] = &["approx_percentile", "avg", "count", "sum"];

/// Bind a builtin aggregate by name. Names are case insensitive.
pub fn plan_aggregate(
    name: &str,
    inputs: Vec<Expression>,
    config: &ExecutionConfig,
) -> Result<AggregateExpr> {
    match name.to_ascii_lowercase().as_str() {
        "approx_percentile" => bind_aggregate(ApproxPercentile, inputs, config),
        "avg" => bind_aggregate(Avg, inputs, config),
        "count" => bind_aggregate(Count, inputs, config),
        "sum" => bind_aggregate(Sum, inputs, config),
        _ => Err(DbError::new(format!("Missing aggregate function '{name}'"))
            .with_field("available", BUILTIN_AGGREGATES.join(", "))),
    }
}
