use indexmap::IndexMap;

use super::scalar::ScalarValue;

/// A single input row, mapping field names to values.
///
/// Field order is preserved. Fields that aren't present are reported as
/// `ScalarValue::Missing`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: IndexMap<String, ScalarValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get the value for a field, returning `Missing` if the field doesn't
    /// exist.
    pub fn get(&self, name: &str) -> ScalarValue {
        self.fields
            .get(name)
            .cloned()
            .unwrap_or(ScalarValue::Missing)
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Row {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
