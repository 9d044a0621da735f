use std::fmt;

use crate::arrays::datatype::DataType;
use crate::arrays::row::Row;
use crate::arrays::scalar::ScalarValue;

/// Reference to a named field in the input row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnExpr {
    pub name: String,
    /// Declared type of the field.
    pub datatype: DataType,
}

impl ColumnExpr {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        ColumnExpr {
            name: name.into(),
            datatype,
        }
    }

    pub fn eval(&self, row: &Row) -> ScalarValue {
        row.get(&self.name)
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
