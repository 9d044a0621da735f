use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Broad classification of an error.
///
/// Callers generally only care about the message, but the kind lets the
/// surrounding engine tell a bad query (range/type) apart from a bug in the
/// plan (unsupported/internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument was outside of its allowed range.
    Range,
    /// A value could not be coerced to the type an operation needs.
    Type,
    /// The operation is never valid for the receiver.
    Unsupported,
    /// Everything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range => write!(f, "Range"),
            Self::Type => write!(f, "Type"),
            Self::Unsupported => write!(f, "Unsupported"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

#[derive(Debug)]
struct DbErrorInner {
    kind: ErrorKind,
    msg: String,
    fields: Vec<(String, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl DbError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Range, msg)
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Type, msg)
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Unsupported, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                kind,
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a key/value pair providing additional context.
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// The error message without any attached fields.
    pub fn message(&self) -> &str {
        &self.inner.msg
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get the value of a field by key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

pub trait ResultExt<T, E> {
    /// Wrap the error with additional context.
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Error with the given message if the value is None.
    fn required(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DbError::new(msg))
    }
}
