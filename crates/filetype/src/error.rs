//! File Type Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, same as every other crate in the workspace.

use derive_more::{Display, Error};

/// A file type error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for file type operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested format name is not one we recognise.
    #[display("unknown file format: {_0}")]
    UnknownFormat(#[error(not(source))] String),
}
