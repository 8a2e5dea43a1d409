//! Storage Error Types
//!
//! Every backend reports failures with the same [`ErrorKind`], so callers can
//! tell a missing object from a flaky network without knowing which backend
//! they are talking to.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing is stored under this key.
    #[display("no object stored at {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Filesystem permissions or bucket credentials refused the request.
    #[display("access to {} denied", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("storage I/O failed: {_0}")]
    Io(IoError),
    /// The object store could not be reached.
    #[display("object store unreachable: {_0}")]
    Network(#[error(not(source))] String),
    /// Empty, or would resolve outside the storage root.
    #[display("unusable storage key: {}", _0.display())]
    InvalidKey(#[error(not(source))] PathBuf),
    #[display("storage backend failure: {_0}")]
    Backend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Transient failures: worth another attempt later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Backend(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
