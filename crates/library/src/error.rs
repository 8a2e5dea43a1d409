//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors raised by the storage backend or the catalog are
//! kept as children of the library error that wraps them, so the full chain
//! is still available when the error is reported.

use derive_more::{Display, Error};
use shelf_filetype::Rejection;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Three families: the caller sent something unacceptable or conflicting
/// ([`is_validation()`](Self::is_validation)), the document does not exist
/// ([`is_not_found()`](Self::is_not_found)), or a dependency failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The uploaded bytes are not a format the library accepts.
    #[display("invalid file type for {name}: {reason}")]
    InvalidFileType {
        name: String,
        #[error(not(source))]
        reason: Rejection,
    },
    /// Document kind outside `book`/`paper`.
    #[display("unsupported type: {_0}")]
    UnsupportedKind(#[error(not(source))] String),
    /// The stored name cannot be used as a storage key.
    #[display("invalid document name: {_0}")]
    InvalidName(#[error(not(source))] String),
    /// Another document, or an uncatalogued file, already occupies the key.
    #[display("storage path already in use: {_0}")]
    PathTaken(#[error(not(source))] String),
    #[display("document not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("storage backend failed to {operation} {key}")]
    Storage { operation: &'static str, key: String },
    #[display("repository failed to {operation} {key}")]
    Repository { operation: &'static str, key: String },
    /// A spawned task (classification, scan discovery) died before
    /// reporting back.
    #[display("pipeline task failed")]
    Pipeline,
    /// The cover service refused or could not be reached.
    #[display("cover notification failed: {_0}")]
    Notification(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileType { .. } | Self::UnsupportedKind(_) | Self::InvalidName(_) | Self::PathTaken(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Repository { .. } | Self::Notification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::UnsupportedKind("magazine".into()), true, false)]
    #[case(ErrorKind::InvalidName("../x.pdf".into()), true, false)]
    #[case(ErrorKind::InvalidFileType { name: "a.zip".into(), reason: Rejection::Unrecognized }, true, false)]
    #[case(ErrorKind::PathTaken("rust-book.pdf".into()), true, false)]
    #[case(ErrorKind::NotFound("abc".into()), false, false)]
    #[case(ErrorKind::Storage { operation: "save", key: "a.pdf".into() }, false, true)]
    #[case(ErrorKind::Repository { operation: "insert", key: "a.pdf".into() }, false, true)]
    #[case(ErrorKind::Pipeline, false, false)]
    fn categories(#[case] kind: ErrorKind, #[case] validation: bool, #[case] retryable: bool) {
        assert_eq!(kind.is_validation(), validation);
        assert_eq!(kind.is_retryable(), retryable);
    }

    #[test]
    fn messages() {
        let kind = ErrorKind::Storage { operation: "save", key: "papers/a.pdf".into() };
        assert_eq!(kind.to_string(), "storage backend failed to save papers/a.pdf");
        assert_eq!(ErrorKind::UnsupportedKind("magazine".into()).to_string(), "unsupported type: magazine");
    }
}
