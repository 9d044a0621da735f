use std::fmt;

use sketchdb_error::{DbError, Result};

use super::Expression;
use crate::arrays::datatype::DataType;
use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
        }
    }
}

impl ArithOperator {
    /// Apply to two integers. Division by zero produces None (null).
    fn apply_int(&self, left: i64, right: i64) -> Result<Option<i64>> {
        let out = match self {
            Self::Add => left.checked_add(right),
            Self::Sub => left.checked_sub(right),
            Self::Mul => left.checked_mul(right),
            Self::Div => {
                if right == 0 {
                    return Ok(None);
                }
                left.checked_div(right)
            }
        };

        match out {
            Some(v) => Ok(Some(v)),
            None => Err(DbError::new("Integer overflow")
                .with_field("op", self)
                .with_field("left", left)
                .with_field("right", right)),
        }
    }

    /// Apply to two floats. Division by zero produces None (null).
    fn apply_float(&self, left: f64, right: f64) -> Option<f64> {
        match self {
            Self::Add => Some(left + right),
            Self::Sub => Some(left - right),
            Self::Mul => Some(left * right),
            Self::Div => {
                if right == 0.0 {
                    None
                } else {
                    Some(left / right)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithExpr {
    pub op: ArithOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl ArithExpr {
    /// Output type, the widest of the input types.
    pub fn datatype(&self) -> DataType {
        self.left
            .datatype()
            .common_numeric(&self.right.datatype())
            .unwrap_or(DataType::Undefined)
    }

    pub fn eval(&self, row: &Row) -> Result<ScalarValue> {
        let left = self.left.eval(row)?;
        let right = self.right.eval(row)?;

        if left.is_missing() || right.is_missing() {
            return Ok(ScalarValue::Missing);
        }
        if left.is_null() || right.is_null() {
            return Ok(ScalarValue::Null);
        }

        let datatype = left
            .datatype()
            .common_numeric(&right.datatype())
            .ok_or_else(|| {
                DbError::type_error(format!(
                    "unexpected types for {}: {}, {}",
                    self.op,
                    left.datatype(),
                    right.datatype()
                ))
            })?;

        if datatype.is_integer() {
            let out = self.op.apply_int(left.try_as_i64()?, right.try_as_i64()?)?;
            return match out {
                Some(v) => narrow_int(datatype, v),
                None => Ok(ScalarValue::Null),
            };
        }

        let out = self.op.apply_float(left.try_as_f64()?, right.try_as_f64()?);
        Ok(match (out, datatype) {
            (Some(v), DataType::Float32) => ScalarValue::Float32(v as f32),
            (Some(v), _) => ScalarValue::Float64(v),
            (None, _) => ScalarValue::Null,
        })
    }
}

/// Convert an i64 result back to the integer type of the inputs.
fn narrow_int(datatype: DataType, v: i64) -> Result<ScalarValue> {
    let overflow = || DbError::new("Integer overflow").with_field("datatype", datatype);
    Ok(match datatype {
        DataType::Int8 => ScalarValue::Int8(i8::try_from(v).map_err(|_| overflow())?),
        DataType::Int16 => ScalarValue::Int16(i16::try_from(v).map_err(|_| overflow())?),
        DataType::Int32 => ScalarValue::Int32(i32::try_from(v).map_err(|_| overflow())?),
        _ => ScalarValue::Int64(v),
    })
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.op, self.left, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{self, column, lit};

    fn row() -> Row {
        Row::new()
            .with_field("i", 4_i32)
            .with_field("f", 1.5_f32)
            .with_field("n", ScalarValue::Null)
            .with_field("s", "str")
    }

    #[test]
    fn integer_keeps_type() {
        let e = expr::mul(column("i", DataType::Int32), lit(10_i32));
        assert_eq!(ScalarValue::Int32(40), e.eval(&row()).unwrap());
        assert_eq!(DataType::Int32, e.datatype());
    }

    #[test]
    fn widens_to_float() {
        let e = expr::add(column("i", DataType::Int32), column("f", DataType::Float32));
        assert_eq!(ScalarValue::Float32(5.5), e.eval(&row()).unwrap());

        let e = expr::div(column("i", DataType::Int32), lit(0.5_f64));
        assert_eq!(ScalarValue::Float64(8.0), e.eval(&row()).unwrap());
    }

    #[test]
    fn null_and_missing_propagate() {
        let e = expr::add(column("i", DataType::Int32), column("n", DataType::Int32));
        assert_eq!(ScalarValue::Null, e.eval(&row()).unwrap());

        let e = expr::add(column("n", DataType::Int32), column("x", DataType::Int32));
        assert_eq!(ScalarValue::Missing, e.eval(&row()).unwrap());
    }

    #[test]
    fn divide_by_zero_is_null() {
        let e = expr::div(column("i", DataType::Int32), lit(0_i32));
        assert_eq!(ScalarValue::Null, e.eval(&row()).unwrap());
    }

    #[test]
    fn overflow_errors() {
        let e = expr::mul(lit(100_i8), lit(100_i8));
        e.eval(&row()).unwrap_err();
    }

    #[test]
    fn non_numeric_errors() {
        let e = expr::add(column("s", DataType::Utf8), lit(1_i32));
        let err = e.eval(&row()).unwrap_err();
        assert_eq!("unexpected types for +: STRING, INTEGER", err.message());
    }

    #[test]
    fn display() {
        let e = expr::mul(column("integer_value", DataType::Int32), lit(10_i32));
        assert_eq!("*(integer_value, 10)", e.to_string());
    }
}
