pub mod const_fold;

use sketchdb_error::Result;

use crate::expr::Expression;

/// A rule that rewrites a single expression tree.
pub trait ExpressionRewriteRule {
    /// Rewrite the expression, returning the new expression.
    ///
    /// Rules that don't apply must return the expression unchanged.
    fn rewrite(expression: Expression) -> Result<Expression>;
}
