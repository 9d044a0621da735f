use std::fmt;

use sketchdb_error::{DbError, Result};

use super::datatype::DataType;

/// A single tagged value.
///
/// `Null` and `Missing` are distinct: null is an explicitly absent value,
/// missing means the field wasn't present in the row at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Missing,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    /// Named fields of a composite value.
    Struct(Vec<(String, ScalarValue)>),
    List(Vec<ScalarValue>),
}

impl ScalarValue {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null | Self::Missing => DataType::Undefined,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
            Self::Struct(_) => DataType::Struct,
            Self::List(_) => DataType::List,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub const fn is_null_or_missing(&self) -> bool {
        matches!(self, Self::Null | Self::Missing)
    }

    /// Get the value as a double.
    ///
    /// Only numeric values can be converted. Every other kind (including null
    /// and missing) errors.
    pub fn try_as_f64(&self) -> Result<f64> {
        Ok(match self {
            Self::Int8(v) => *v as f64,
            Self::Int16(v) => *v as f64,
            Self::Int32(v) => *v as f64,
            Self::Int64(v) => *v as f64,
            Self::Float32(v) => *v as f64,
            Self::Float64(v) => *v,
            other => return Err(invalid_conversion("doubleValue", other)),
        })
    }

    /// Get the value as an i64, only integer kinds can be converted.
    pub fn try_as_i64(&self) -> Result<i64> {
        Ok(match self {
            Self::Int8(v) => *v as i64,
            Self::Int16(v) => *v as i64,
            Self::Int32(v) => *v as i64,
            Self::Int64(v) => *v,
            other => return Err(invalid_conversion("longValue", other)),
        })
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(invalid_conversion("booleanValue", other)),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(v) => Ok(v),
            other => Err(invalid_conversion("stringValue", other)),
        }
    }
}

fn invalid_conversion(target: &str, value: &ScalarValue) -> DbError {
    DbError::type_error(format!(
        "invalid to get {target} from value of type {}",
        value.datatype()
    ))
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Missing => write!(f, "MISSING"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v:?}"),
            Self::Float64(v) => write!(f, "{v:?}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Struct(fields) => {
                write!(f, "{{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($prim:ty, $variant:ident) => {
        impl From<$prim> for ScalarValue {
            fn from(value: $prim) -> Self {
                ScalarValue::$variant(value)
            }
        }
    };
}

impl_from_primitive!(bool, Boolean);
impl_from_primitive!(i8, Int8);
impl_from_primitive!(i16, Int16);
impl_from_primitive!(i32, Int32);
impl_from_primitive!(i64, Int64);
impl_from_primitive!(f32, Float32);
impl_from_primitive!(f64, Float64);
impl_from_primitive!(String, Utf8);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => ScalarValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use sketchdb_error::ErrorKind;

    use super::*;

    #[test]
    fn numeric_to_f64() {
        assert_eq!(4.0, ScalarValue::Int8(4).try_as_f64().unwrap());
        assert_eq!(4.0, ScalarValue::Int16(4).try_as_f64().unwrap());
        assert_eq!(4.0, ScalarValue::Int32(4).try_as_f64().unwrap());
        assert_eq!(4.0, ScalarValue::Int64(4).try_as_f64().unwrap());
        assert_eq!(4.5, ScalarValue::Float32(4.5).try_as_f64().unwrap());
        assert_eq!(4.5, ScalarValue::Float64(4.5).try_as_f64().unwrap());
    }

    #[test]
    fn non_numeric_to_f64() {
        let cases = [
            (ScalarValue::from("m"), "STRING"),
            (ScalarValue::Boolean(true), "BOOLEAN"),
            (ScalarValue::Struct(vec![("a".to_string(), 1_i32.into())]), "STRUCT"),
            (ScalarValue::List(vec![1_i32.into()]), "ARRAY"),
            (ScalarValue::Null, "UNDEFINED"),
        ];

        for (value, kind) in cases {
            let err = value.try_as_f64().unwrap_err();
            assert_eq!(ErrorKind::Type, err.kind());
            assert_eq!(
                format!("invalid to get doubleValue from value of type {kind}"),
                err.message()
            );
        }
    }

    #[test]
    fn display_nested() {
        let value = ScalarValue::Struct(vec![
            ("a".to_string(), 1_i32.into()),
            ("b".to_string(), ScalarValue::List(vec![2.5_f64.into(), ScalarValue::Null])),
        ]);
        assert_eq!("{a: 1, b: [2.5, NULL]}", value.to_string());
    }

    #[test]
    fn from_option() {
        assert_eq!(ScalarValue::Null, ScalarValue::from(None::<i32>));
        assert_eq!(ScalarValue::Int32(3), ScalarValue::from(Some(3_i32)));
    }
}
