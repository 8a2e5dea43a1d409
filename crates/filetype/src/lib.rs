//! File type detection for documents entering the library.
//!
//! This crate identifies uploads from their leading bytes rather than trusting
//! whatever filename or content type the client claimed, providing:
//!
//! - **Format detection** from magic bytes ([`FileKind::from_magic_bytes`])
//!   or file extensions ([`FileKind::from_path`])
//! - **Classification** of a seekable stream against the set of formats the
//!   library accepts ([`classify`]), leaving the stream where it was found so
//!   the caller can go on to store it in full.
//!
//! Only PDF and EPUB are accepted. A handful of other formats are *recognised*
//! so that rejections can say what was actually uploaded (a zip archive, a
//! Mobipocket book, a compressed tarball...) instead of "unknown".

mod classify;
mod construct;
pub mod error;
mod util;

pub use crate::classify::{HEADER_SIZE, Rejection, Verdict, classify};

/// A recognised file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Portable Document Format (.pdf)
    Pdf,
    /// EPUB electronic publication (.epub)
    Epub,
    /// Mobipocket e-book (.mobi)
    Mobi,
    /// Plain zip archive (.zip)
    Zip,
    /// Gzip compressed data (.gz)
    Gzip,
    /// Bzip2 compressed data (.bz2)
    Bzip2,
    /// XZ/LZMA compressed data (.xz)
    Xz,
    /// Zstd compressed data (.zst)
    Zstd,
}

impl FileKind {
    /// Whether documents of this kind may be added to the library.
    ///
    /// Mobi is recognised but not accepted until something downstream can
    /// render covers for it.
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, FileKind::Pdf | FileKind::Epub)
    }
}
