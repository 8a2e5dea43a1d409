//! Storage key handling.
//!
//! Every backend addresses objects by a relative key. Keys arrive from user
//! uploads (the original filename) and from backend listings, so they are
//! normalised into one canonical form before any backend touches them.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Normalise a storage key, refusing anything that would leave the storage
/// root.
///
/// `.` segments, repeated separators and a leading or trailing `/` are
/// dropped. A `..` segment removes the segment before it; a `..` with nothing
/// left to remove is an error. Keys containing NUL bytes, Windows drive
/// prefixes, or nothing at all after normalisation are rejected with
/// [`InvalidKey`](ErrorKind::InvalidKey).
///
/// ```
/// use shelf_storage::validate_path;
/// use std::path::Path;
///
/// assert_eq!(validate_path("papers//2024/./attention.pdf").unwrap(), Path::new("papers/2024/attention.pdf"));
/// assert_eq!(validate_path("/rust-book.pdf").unwrap(), Path::new("rust-book.pdf"));
/// assert!(validate_path("../secrets.pdf").is_err());
/// ```
pub fn validate(key: impl AsRef<Path>) -> Result<PathBuf> {
    let key = key.as_ref();
    let reject = || exn::Exn::from(ErrorKind::InvalidKey(key.to_path_buf()));
    let mut segments = Vec::new();
    for component in key.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => return Err(reject()),
            Component::Normal(segment) => segments.push(segment),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                segments.pop().ok_or_else(reject)?;
            },
            Component::Prefix(_) => return Err(reject()),
        }
    }
    if segments.is_empty() {
        return Err(reject());
    }
    Ok(segments.into_iter().collect())
}

/// Final key segment without its extension: `papers/attention.pdf` gives
/// `attention`.
///
/// Only the last extension is removed, so `archive.tar.pdf` gives
/// `archive.tar`. Returns `None` for keys without a final segment.
pub fn file_stem(key: impl AsRef<Path>) -> Option<String> {
    key.as_ref().file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rust-book.pdf", "rust-book.pdf")]
    #[case("papers/2024/attention.pdf", "papers/2024/attention.pdf")]
    #[case("papers//2024//attention.pdf", "papers/2024/attention.pdf")]
    #[case("./papers/./attention.pdf", "papers/attention.pdf")]
    #[case("/absolute/looking.pdf", "absolute/looking.pdf")]
    #[case("papers/drafts/../attention.pdf", "papers/attention.pdf")]
    #[case("papers/", "papers")]
    fn normalises_keys(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("/")]
    #[case("..")]
    #[case("../outside.pdf")]
    #[case("papers/../../outside.pdf")]
    #[case("nul\0byte.pdf")]
    fn rejects_keys(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[rstest]
    #[case("rust-book.pdf", Some("rust-book"))]
    #[case("papers/2024/attention.pdf", Some("attention"))]
    #[case("archive.tar.pdf", Some("archive.tar"))]
    #[case("no-extension", Some("no-extension"))]
    #[case("..", None)]
    fn stems(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(file_stem(input).as_deref(), expected);
    }
}
