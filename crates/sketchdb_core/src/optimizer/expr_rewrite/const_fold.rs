use sketchdb_error::Result;

use super::ExpressionRewriteRule;
use crate::arrays::row::Row;
use crate::expr::Expression;
use crate::expr::literal_expr::LiteralExpr;

/// Pre-compute constant expressions.
#[derive(Debug)]
pub struct ConstFold;

impl ExpressionRewriteRule for ConstFold {
    fn rewrite(mut expression: Expression) -> Result<Expression> {
        maybe_fold(&mut expression)?;
        Ok(expression)
    }
}

fn maybe_fold(expr: &mut Expression) -> Result<()> {
    if matches!(expr, Expression::Literal(_)) {
        return Ok(());
    }

    if expr.is_const_foldable() {
        // Nothing references a column, so an empty row is enough.
        let val = expr.eval(&Row::new())?;
        *expr = Expression::Literal(LiteralExpr { literal: val });

        return Ok(());
    }

    // Otherwise try the children.
    expr.for_each_child_mut(&mut |child| maybe_fold(child))
}
