//! Error types for the document store.

use std::fmt::{Display, Formatter};

/// Errors produced by the document store and its validation layer.
#[derive(Debug)]
pub enum StoreError {
    /// The payload failed a shape, range, or referential rule. Rejected
    /// before any write, so stored state is untouched.
    Validation(String),
    /// The on-disk document does not have the expected shape.
    StorageFormat(String),
    /// The underlying filesystem operation failed.
    Io(std::io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::StorageFormat(message) => write!(f, "invalid data file: {message}"),
            Self::Io(err) => write!(f, "storage i/o failed: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
