pub mod aggregate_expr;
pub mod arith_expr;
pub mod column_expr;
pub mod comparison_expr;
pub mod literal_expr;

use std::fmt;

use aggregate_expr::AggregateExpr;
use arith_expr::{ArithExpr, ArithOperator};
use column_expr::ColumnExpr;
use comparison_expr::{ComparisonExpr, ComparisonOperator};
use literal_expr::LiteralExpr;
use sketchdb_error::{DbError, Result};

use crate::arrays::datatype::DataType;
use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Aggregate(AggregateExpr),
    Arith(ArithExpr),
    Column(ColumnExpr),
    Comparison(ComparisonExpr),
    Literal(LiteralExpr),
}

impl Expression {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Aggregate(expr) => expr.return_type,
            Self::Arith(expr) => expr.datatype(),
            Self::Column(expr) => expr.datatype,
            Self::Comparison(_) => DataType::Boolean,
            Self::Literal(expr) => expr.literal.datatype(),
        }
    }

    /// Evaluate this expression against a single row.
    ///
    /// Aggregates can't be evaluated row by row and always error.
    pub fn eval(&self, row: &Row) -> Result<ScalarValue> {
        match self {
            Self::Aggregate(expr) => expr.eval(row),
            Self::Arith(expr) => expr.eval(row),
            Self::Column(expr) => Ok(expr.eval(row)),
            Self::Comparison(expr) => expr.eval(row),
            Self::Literal(expr) => Ok(expr.literal.clone()),
        }
    }

    /// Checks if this expression can be evaluated without any input row.
    pub fn is_const_foldable(&self) -> bool {
        match self {
            Self::Aggregate(_) | Self::Column(_) => false,
            Self::Literal(_) => true,
            Self::Arith(expr) => expr.left.is_const_foldable() && expr.right.is_const_foldable(),
            Self::Comparison(expr) => {
                expr.left.is_const_foldable() && expr.right.is_const_foldable()
            }
        }
    }

    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::Aggregate(expr) => {
                for input in &mut expr.inputs {
                    func(input)?;
                }
                if let Some(filter) = expr.filter.as_mut() {
                    func(&mut **filter)?;
                }
            }
            Self::Arith(expr) => {
                func(&mut *expr.left)?;
                func(&mut *expr.right)?;
            }
            Self::Comparison(expr) => {
                func(&mut *expr.left)?;
                func(&mut *expr.right)?;
            }
            Self::Column(_) | Self::Literal(_) => (),
        }
        Ok(())
    }

    /// Try to get the value of a literal expression.
    ///
    /// This does not try to fold the expression, callers should run constant
    /// folding first.
    pub fn try_into_scalar(self) -> Result<ScalarValue> {
        match self {
            Self::Literal(expr) => Ok(expr.literal),
            other => Err(DbError::new("Expression is not a constant").with_field("expr", other)),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate(expr) => write!(f, "{expr}"),
            Self::Arith(expr) => write!(f, "{expr}"),
            Self::Column(expr) => write!(f, "{expr}"),
            Self::Comparison(expr) => write!(f, "{expr}"),
            Self::Literal(expr) => write!(f, "{expr}"),
        }
    }
}

impl From<AggregateExpr> for Expression {
    fn from(value: AggregateExpr) -> Self {
        Expression::Aggregate(value)
    }
}

impl From<ArithExpr> for Expression {
    fn from(value: ArithExpr) -> Self {
        Expression::Arith(value)
    }
}

impl From<ColumnExpr> for Expression {
    fn from(value: ColumnExpr) -> Self {
        Expression::Column(value)
    }
}

impl From<ComparisonExpr> for Expression {
    fn from(value: ComparisonExpr) -> Self {
        Expression::Comparison(value)
    }
}

impl From<LiteralExpr> for Expression {
    fn from(value: LiteralExpr) -> Self {
        Expression::Literal(value)
    }
}

pub fn lit(scalar: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(LiteralExpr {
        literal: scalar.into(),
    })
}

pub fn column(name: impl Into<String>, datatype: DataType) -> Expression {
    Expression::Column(ColumnExpr::new(name, datatype))
}

pub fn arith(
    op: ArithOperator,
    left: impl Into<Expression>,
    right: impl Into<Expression>,
) -> Expression {
    Expression::Arith(ArithExpr {
        op,
        left: Box::new(left.into()),
        right: Box::new(right.into()),
    })
}

pub fn add(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    arith(ArithOperator::Add, left, right)
}

pub fn sub(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    arith(ArithOperator::Sub, left, right)
}

pub fn mul(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    arith(ArithOperator::Mul, left, right)
}

pub fn div(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    arith(ArithOperator::Div, left, right)
}

pub fn compare(
    op: ComparisonOperator,
    left: impl Into<Expression>,
    right: impl Into<Expression>,
) -> Expression {
    Expression::Comparison(ComparisonExpr {
        op,
        left: Box::new(left.into()),
        right: Box::new(right.into()),
    })
}

pub fn eq(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    compare(ComparisonOperator::Eq, left, right)
}

pub fn lt(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    compare(ComparisonOperator::Lt, left, right)
}

pub fn gt(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    compare(ComparisonOperator::Gt, left, right)
}
