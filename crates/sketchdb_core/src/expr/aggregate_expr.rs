use std::fmt;
use std::sync::Arc;

use sketchdb_error::{DbError, Result};

use super::Expression;
use crate::arrays::datatype::DataType;
use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;
use crate::functions::aggregate::{AggregationState, RawAggregate};

/// A bound aggregate along with the expressions producing its input.
#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub agg: Arc<dyn RawAggregate>,
    /// Input expressions, evaluated per row.
    pub inputs: Vec<Expression>,
    /// Optional filter. Only rows where this evaluates to true are
    /// aggregated.
    pub filter: Option<Box<Expression>>,
    pub return_type: DataType,
}

impl AggregateExpr {
    pub fn name(&self) -> &'static str {
        self.agg.name()
    }

    pub fn with_filter(mut self, filter: impl Into<Expression>) -> Self {
        self.filter = Some(Box::new(filter.into()));
        self
    }

    pub fn create(&self) -> Result<AggregationState> {
        self.agg.create()
    }

    pub fn iterate(&self, value: &ScalarValue, state: &mut AggregationState) -> Result<()> {
        self.agg.iterate(value, state)
    }

    pub fn combine(&self, target: &mut AggregationState, source: AggregationState) -> Result<()> {
        self.agg.combine(target, source)
    }

    pub fn result(&self, state: &AggregationState) -> Result<ScalarValue> {
        self.agg.result(state)
    }

    /// Human readable form of the aggregate, e.g.
    /// `approx_percentile(*(integer_value, 10))`.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Fold a single row into the state.
    ///
    /// Rows not passing the filter are skipped, as are rows where the input
    /// evaluates to null or missing.
    pub fn update(&self, row: &Row, state: &mut AggregationState) -> Result<()> {
        if let Some(filter) = &self.filter {
            match filter.eval(row)? {
                ScalarValue::Boolean(true) => (),
                ScalarValue::Boolean(false) | ScalarValue::Null | ScalarValue::Missing => {
                    return Ok(());
                }
                other => {
                    return Err(DbError::type_error(format!(
                        "filter for {} must be a boolean, got {}",
                        self.name(),
                        other.datatype()
                    )));
                }
            }
        }

        let value = match self.inputs.as_slice() {
            [] => ScalarValue::Boolean(true),
            [input] => input.eval(row)?,
            inputs => {
                return Err(DbError::new("Aggregate expects at most one input")
                    .with_field("function", self.name())
                    .with_field("inputs", inputs.len()));
            }
        };

        if value.is_null_or_missing() {
            return Ok(());
        }

        self.agg.iterate(&value, state)
    }

    /// Aggregates only produce values over a set of rows.
    pub fn eval(&self, _row: &Row) -> Result<ScalarValue> {
        Err(DbError::unsupported(format!(
            "can't evaluate on aggregator: {}",
            self.name()
        )))
    }
}

impl PartialEq for AggregateExpr {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.inputs == other.inputs
            && self.filter == other.filter
            && self.return_type == other.return_type
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (idx, input) in self.inputs.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{input}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use sketchdb_error::ErrorKind;

    use super::*;
    use crate::config::execution::ExecutionConfig;
    use crate::expr::{self, column, lit};
    use crate::functions::aggregate::bind_aggregate;
    use crate::functions::aggregate::builtin::count::Count;
    use crate::functions::aggregate::builtin::sum::Sum;

    fn sum_of(name: &str) -> AggregateExpr {
        bind_aggregate(
            Sum,
            vec![column(name, DataType::Int32)],
            &ExecutionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn update_skips_null_and_missing() {
        let agg = sum_of("a");
        let mut state = agg.create().unwrap();

        agg.update(&Row::new().with_field("a", 3_i32), &mut state)
            .unwrap();
        agg.update(&Row::new().with_field("a", ScalarValue::Null), &mut state)
            .unwrap();
        agg.update(&Row::new(), &mut state).unwrap();

        assert_eq!(ScalarValue::Int64(3), agg.result(&state).unwrap());
    }

    #[test]
    fn update_applies_filter() {
        let agg = sum_of("a").with_filter(expr::gt(column("a", DataType::Int32), lit(1_i32)));
        let mut state = agg.create().unwrap();

        for v in [1_i32, 2, 3] {
            agg.update(&Row::new().with_field("a", v), &mut state)
                .unwrap();
        }

        assert_eq!(ScalarValue::Int64(5), agg.result(&state).unwrap());
    }

    #[test]
    fn non_boolean_filter_errors() {
        let agg = sum_of("a").with_filter(lit(1_i32));
        let mut state = agg.create().unwrap();

        let err = agg
            .update(&Row::new().with_field("a", 1_i32), &mut state)
            .unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());
    }

    #[test]
    fn count_star_has_no_inputs() {
        let agg = bind_aggregate(Count, Vec::new(), &ExecutionConfig::default()).unwrap();
        let mut state = agg.create().unwrap();

        agg.update(&Row::new(), &mut state).unwrap();
        agg.update(&Row::new().with_field("a", ScalarValue::Null), &mut state)
            .unwrap();

        assert_eq!(ScalarValue::Int64(2), agg.result(&state).unwrap());
        assert_eq!("count()", agg.describe());
    }

    #[test]
    fn eval_errors() {
        let agg = sum_of("a");
        let err = agg.eval(&Row::new()).unwrap_err();
        assert_eq!(ErrorKind::Unsupported, err.kind());
        assert_eq!("can't evaluate on aggregator: sum", err.message());

        let err = Expression::from(agg).eval(&Row::new()).unwrap_err();
        assert_eq!("can't evaluate on aggregator: sum", err.message());
    }

    #[test]
    fn display_ignores_filter() {
        let agg = sum_of("a").with_filter(expr::gt(column("a", DataType::Int32), lit(1_i32)));
        assert_eq!("sum(a)", agg.to_string());
    }
}
