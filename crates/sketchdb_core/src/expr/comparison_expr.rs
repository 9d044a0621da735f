use std::cmp::Ordering;
use std::fmt;

use sketchdb_error::{DbError, Result};

use super::Expression;
use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOperator {
    fn matches(&self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::NotEq => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::LtEq => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::GtEq => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub op: ComparisonOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl ComparisonExpr {
    pub fn eval(&self, row: &Row) -> Result<ScalarValue> {
        let left = self.left.eval(row)?;
        let right = self.right.eval(row)?;

        if left.is_missing() || right.is_missing() {
            return Ok(ScalarValue::Missing);
        }
        if left.is_null() || right.is_null() {
            return Ok(ScalarValue::Null);
        }

        let ord = match (&left, &right) {
            (ScalarValue::Utf8(l), ScalarValue::Utf8(r)) => Some(l.cmp(r)),
            (ScalarValue::Boolean(l), ScalarValue::Boolean(r)) => Some(l.cmp(r)),
            (l, r) if l.datatype().is_numeric() && r.datatype().is_numeric() => {
                l.try_as_f64()?.partial_cmp(&r.try_as_f64()?)
            }
            (l, r) => {
                return Err(DbError::type_error(format!(
                    "unexpected types for {}: {}, {}",
                    self.op,
                    l.datatype(),
                    r.datatype()
                )));
            }
        };

        // NaN compares as null.
        Ok(match ord {
            Some(ord) => ScalarValue::Boolean(self.op.matches(ord)),
            None => ScalarValue::Null,
        })
    }
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.op, self.left, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::expr::{self, column, lit};

    #[test]
    fn numeric_across_types() {
        let row = Row::new().with_field("a", 2_i64);

        let e = expr::gt(column("a", DataType::Int64), lit(1.5_f32));
        assert_eq!(ScalarValue::Boolean(true), e.eval(&row).unwrap());

        let e = expr::compare(ComparisonOperator::LtEq, column("a", DataType::Int64), lit(2_i8));
        assert_eq!(ScalarValue::Boolean(true), e.eval(&row).unwrap());

        let e = expr::compare(ComparisonOperator::NotEq, column("a", DataType::Int64), lit(2_i32));
        assert_eq!(ScalarValue::Boolean(false), e.eval(&row).unwrap());
    }

    #[test]
    fn strings() {
        let row = Row::new().with_field("s", "b");
        let e = expr::lt(column("s", DataType::Utf8), lit("c"));
        assert_eq!(ScalarValue::Boolean(true), e.eval(&row).unwrap());
    }

    #[test]
    fn null_missing() {
        let row = Row::new().with_field("n", ScalarValue::Null);
        let e = expr::eq(column("n", DataType::Int32), lit(1_i32));
        assert_eq!(ScalarValue::Null, e.eval(&row).unwrap());

        let e = expr::eq(column("m", DataType::Int32), lit(1_i32));
        assert_eq!(ScalarValue::Missing, e.eval(&row).unwrap());
    }

    #[test]
    fn mismatched_types() {
        let row = Row::new().with_field("s", "b");
        let e = expr::gt(column("s", DataType::Utf8), lit(1_i32));
        let err = e.eval(&row).unwrap_err();
        assert_eq!("unexpected types for >: STRING, INTEGER", err.message());
    }

    #[test]
    fn display() {
        let e = expr::gt(column("integer_value", DataType::Int32), lit(1_i32));
        assert_eq!(">(integer_value, 1)", e.to_string());
    }
}
