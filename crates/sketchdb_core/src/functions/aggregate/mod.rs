pub mod builtin;

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use sketchdb_error::{DbError, Result};

use super::bind_state::BindState;
use crate::arrays::scalar::ScalarValue;
use crate::config::execution::ExecutionConfig;
use crate::expr::Expression;
use crate::expr::aggregate_expr::AggregateExpr;

/// A typed aggregate function.
///
/// Implementations are stateless. All per-group state lives in
/// `GroupState`, and anything resolved once during planning lives in
/// `BindState`.
pub trait AggregateFunction: Debug + Clone + Copy + Sync + Send + 'static {
    const NAME: &'static str;

    type BindState: Debug + Sync + Send;
    type GroupState: Debug + Send + 'static;

    /// Bind the function to its input expressions.
    fn bind(
        &self,
        inputs: Vec<Expression>,
        config: &ExecutionConfig,
    ) -> Result<BindState<Self::BindState>>;

    /// Create a new, empty state for a group.
    fn create(state: &Self::BindState) -> Result<Self::GroupState>;

    /// Fold a single value into the group state.
    ///
    /// Null and missing values are filtered out before this is called, as are
    /// rows rejected by the aggregate's filter.
    fn iterate(
        state: &Self::BindState,
        value: &ScalarValue,
        group: &mut Self::GroupState,
    ) -> Result<()>;

    /// Combine `source` into `target`. Both states must be for the same
    /// group.
    fn combine(
        state: &Self::BindState,
        target: &mut Self::GroupState,
        source: Self::GroupState,
    ) -> Result<()>;

    /// Produce the final value for a group.
    ///
    /// This must not change the group state.
    fn result(state: &Self::BindState, group: &Self::GroupState) -> Result<ScalarValue>;
}

/// Bind an aggregate function, producing an aggregate expression.
pub fn bind_aggregate<F: AggregateFunction>(
    function: F,
    inputs: Vec<Expression>,
    config: &ExecutionConfig,
) -> Result<AggregateExpr> {
    let bind = function.bind(inputs, config)?;

    Ok(AggregateExpr {
        agg: Arc::new(BoundAggregate {
            function,
            state: bind.state,
        }),
        inputs: bind.inputs,
        filter: None,
        return_type: bind.return_type,
    })
}

/// Type erased aggregate, allowing a heterogeneous set of aggregates to be
/// held by a single operator.
pub trait RawAggregate: Debug + Sync + Send {
    fn name(&self) -> &'static str;

    fn create(&self) -> Result<AggregationState>;

    fn iterate(&self, value: &ScalarValue, state: &mut AggregationState) -> Result<()>;

    fn combine(&self, target: &mut AggregationState, source: AggregationState) -> Result<()>;

    fn result(&self, state: &AggregationState) -> Result<ScalarValue>;
}

#[derive(Debug)]
pub struct BoundAggregate<F: AggregateFunction> {
    function: F,
    state: F::BindState,
}

impl<F: AggregateFunction> BoundAggregate<F> {
    pub fn function(&self) -> F {
        self.function
    }

    pub fn bind_state(&self) -> &F::BindState {
        &self.state
    }
}

impl<F: AggregateFunction> RawAggregate for BoundAggregate<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn create(&self) -> Result<AggregationState> {
        let state = F::create(&self.state)?;
        Ok(AggregationState::new(F::NAME, state))
    }

    fn iterate(&self, value: &ScalarValue, state: &mut AggregationState) -> Result<()> {
        let group = state.downcast_mut::<F::GroupState>(F::NAME)?;
        F::iterate(&self.state, value, group)
    }

    fn combine(&self, target: &mut AggregationState, source: AggregationState) -> Result<()> {
        let source = source.downcast::<F::GroupState>(F::NAME)?;
        let target = target.downcast_mut::<F::GroupState>(F::NAME)?;
        F::combine(&self.state, target, source)
    }

    fn result(&self, state: &AggregationState) -> Result<ScalarValue> {
        let group = state.downcast_ref::<F::GroupState>(F::NAME)?;
        F::result(&self.state, group)
    }
}

/// Opaque per-group state for an aggregate.
///
/// Each state is exclusively owned by whoever is folding rows for the
/// group.
pub struct AggregationState {
    /// Name of the function that created this state.
    function: &'static str,
    state: Box<dyn Any + Send>,
}

impl AggregationState {
    fn new<S: Any + Send>(function: &'static str, state: S) -> Self {
        AggregationState {
            function,
            state: Box::new(state),
        }
    }

    fn mismatch(&self, expected: &'static str) -> DbError {
        DbError::new("Attempted to use aggregate state of a different type")
            .with_field("expected", expected)
            .with_field("got", self.function)
    }

    fn downcast_ref<S: 'static>(&self, expected: &'static str) -> Result<&S> {
        self.state
            .downcast_ref::<S>()
            .ok_or_else(|| self.mismatch(expected))
    }

    fn downcast_mut<S: 'static>(&mut self, expected: &'static str) -> Result<&mut S> {
        if !self.state.is::<S>() {
            return Err(self.mismatch(expected));
        }
        self.state
            .downcast_mut::<S>()
            .ok_or_else(|| DbError::new("Aggregate state downcast failed"))
    }

    fn downcast<S: 'static>(self, expected: &'static str) -> Result<S> {
        let function = self.function;
        self.state
            .downcast::<S>()
            .map(|s| *s)
            .map_err(|_| {
                DbError::new("Attempted to use aggregate state of a different type")
                    .with_field("expected", expected)
                    .with_field("got", function)
            })
    }
}

impl fmt::Debug for AggregationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationState")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::expr::column;
    use crate::functions::aggregate::builtin::count::Count;
    use crate::functions::aggregate::builtin::sum::Sum;

    #[test]
    fn mismatched_state_errors() {
        let conf = ExecutionConfig::default();
        let count =
            bind_aggregate(Count, vec![column("a", DataType::Int32)], &conf).unwrap();
        let sum = bind_aggregate(Sum, vec![column("a", DataType::Int32)], &conf).unwrap();

        let mut count_state = count.create().unwrap();
        let err = sum
            .iterate(&ScalarValue::Int32(1), &mut count_state)
            .unwrap_err();
        assert_eq!(Some("sum"), err.field("expected"));
        assert_eq!(Some("count"), err.field("got"));

        let sum_state = sum.create().unwrap();
        count.combine(&mut count_state, sum_state).unwrap_err();
        sum.result(&count_state).unwrap_err();
    }
}
