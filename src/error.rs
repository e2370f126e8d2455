use std::fmt;

/// A single failed write reported by a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub id: String,
    pub error: MemoryError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// An accessor was used without a parent or an id resolver.
    NotConfigured(&'static str),
    /// The value assigned to a property does not match its declared type.
    InvalidAssignment {
        property: String,
        expected: &'static str,
    },
    /// A container already holds a record with this id.
    DuplicateId(String),
    /// A container holds no record with this id.
    NotFound(String),
    /// The request context lacks an attribute an id resolver needs.
    MissingContextAttribute(&'static str),
    /// A reference operation found no document container up the parent chain.
    StoreUnavailable,
    /// A record body is not a keyed record or carries an unusable id.
    InvalidRecord(String),
    IndexOutOfRange {
        property: String,
        index: usize,
        len: usize,
    },
    InvalidItemKey(String),
    LockPoisoned(&'static str),
    Serde(String),
    Storage(String),
    /// One or more writes failed during a flush. Successful writes are kept.
    Flush(Vec<FlushFailure>),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::NotConfigured(what) => {
                write!(f, "the property doesn't have a '{}' assigned", what)
            }
            MemoryError::InvalidAssignment { property, expected } => write!(
                f,
                "invalid value assigned to property '{}' (expected {})",
                property, expected
            ),
            MemoryError::DuplicateId(id) => {
                write!(f, "a document with an id of '{}' already exists", id)
            }
            MemoryError::NotFound(id) => {
                write!(f, "a document with an id of '{}' could not be found", id)
            }
            MemoryError::MissingContextAttribute(name) => {
                write!(f, "request context is missing the '{}' attribute", name)
            }
            MemoryError::StoreUnavailable => write!(
                f,
                "unable to perform operation because a document container isn't accessible"
            ),
            MemoryError::InvalidRecord(message) => write!(f, "invalid record: {}", message),
            MemoryError::IndexOutOfRange {
                property,
                index,
                len,
            } => write!(
                f,
                "index {} out of range for property '{}' (length {})",
                index, property, len
            ),
            MemoryError::InvalidItemKey(key) => write!(f, "invalid collection item key '{}'", key),
            MemoryError::LockPoisoned(operation) => {
                write!(f, "lock poisoned during {}", operation)
            }
            MemoryError::Serde(message) => write!(f, "serialization error: {}", message),
            MemoryError::Storage(message) => write!(f, "storage error: {}", message),
            MemoryError::Flush(failures) => {
                write!(f, "flush failed for {} entr", failures.len())?;
                write!(f, "{}", if failures.len() == 1 { "y" } else { "ies" })?;
                for failure in failures {
                    write!(f, "; '{}': {}", failure.id, failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MemoryError {}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serde(err.to_string())
    }
}
