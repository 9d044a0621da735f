use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a value.
///
/// Display names follow the SQL-facing type names (`INTEGER`, `DOUBLE`, ...)
/// since that's what ends up in user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of null and missing values.
    Undefined,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Struct,
    List,
}

impl DataType {
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Position in the numeric widening order, None for non-numeric types.
    const fn numeric_rank(&self) -> Option<u8> {
        Some(match self {
            Self::Int8 => 0,
            Self::Int16 => 1,
            Self::Int32 => 2,
            Self::Int64 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            _ => return None,
        })
    }

    /// Get the numeric type both `self` and `other` can be widened to.
    ///
    /// Returns None if either type is not numeric.
    pub fn common_numeric(&self, other: &DataType) -> Option<DataType> {
        let left = self.numeric_rank()?;
        let right = other.numeric_rank()?;
        Some(if left >= right { *self } else { *other })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "UNDEFINED"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Int8 => write!(f, "BYTE"),
            Self::Int16 => write!(f, "SHORT"),
            Self::Int32 => write!(f, "INTEGER"),
            Self::Int64 => write!(f, "LONG"),
            Self::Float32 => write!(f, "FLOAT"),
            Self::Float64 => write!(f, "DOUBLE"),
            Self::Utf8 => write!(f, "STRING"),
            Self::Struct => write!(f, "STRUCT"),
            Self::List => write!(f, "ARRAY"),
        }
    }
}
