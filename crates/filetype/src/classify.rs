//! Accept/reject classification of uploaded streams.
//!
//! Peek-decide-rewind: read a fixed-size header, decide whether the library
//! accepts the file, then seek back so the caller can stream the whole thing
//! into storage as if nothing had been read.

use crate::FileKind;
use derive_more::Display;
use std::io::{self, Read, Seek, SeekFrom};

/// Number of leading bytes inspected. Large enough to cover every signature
/// table we match against (the deepest is the Mobi header at offset 60, but
/// the figure matches the header size common magic-number libraries read).
pub const HEADER_SIZE: usize = 261;

/// Why a stream was turned away.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The stream ended before a full header could be read.
    #[display("short read: only {_0} header bytes available")]
    ShortRead(usize),
    /// Reading or rewinding the stream failed.
    #[display("I/O error: {_0}")]
    Io(io::ErrorKind),
    /// No known signature matched.
    #[display("unrecognised file type")]
    Unrecognized,
    /// A known format that the library does not accept.
    #[display("unsupported file type: {_0}")]
    Unsupported(FileKind),
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(FileKind),
    Rejected(Rejection),
}
impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// The detected kind, if the stream was accepted.
    pub fn kind(&self) -> Option<FileKind> {
        match self {
            Verdict::Accepted(kind) => Some(*kind),
            Verdict::Rejected(_) => None,
        }
    }
}

/// Classify a stream by its first [`HEADER_SIZE`] bytes.
///
/// The read position is restored to wherever it was on entry before
/// returning, whatever the verdict. If the position cannot be restored the
/// stream is rejected, since the caller would otherwise store a truncated
/// file.
///
/// # Example
///
/// ```
/// use shelf_filetype::{FileKind, HEADER_SIZE, Verdict, classify};
/// use std::io::{Cursor, Seek};
///
/// let mut pdf = b"%PDF-1.4\n".to_vec();
/// pdf.resize(HEADER_SIZE * 2, b' ');
/// let mut stream = Cursor::new(pdf);
///
/// assert_eq!(classify(&mut stream), Verdict::Accepted(FileKind::Pdf));
/// assert_eq!(stream.stream_position().unwrap(), 0);
/// ```
pub fn classify<R: Read + Seek + ?Sized>(source: &mut R) -> Verdict {
    let start = match source.stream_position() {
        Ok(position) => position,
        Err(e) => return Verdict::Rejected(Rejection::Io(e.kind())),
    };
    let inspected = inspect(source);
    if let Err(e) = source.seek(SeekFrom::Start(start)) {
        tracing::error!(error = %e, "could not rewind stream after reading file header");
        return Verdict::Rejected(Rejection::Io(e.kind()));
    }
    match inspected {
        Ok(kind) if kind.is_supported() => Verdict::Accepted(kind),
        Ok(kind) => {
            tracing::warn!(kind = %kind, mime = kind.mime_type(), "file type not supported");
            Verdict::Rejected(Rejection::Unsupported(kind))
        },
        Err(rejection) => {
            tracing::warn!(%rejection, "file header rejected");
            Verdict::Rejected(rejection)
        },
    }
}

fn inspect<R: Read + ?Sized>(source: &mut R) -> Result<FileKind, Rejection> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    (&mut *source).take(HEADER_SIZE as u64).read_to_end(&mut header).map_err(|e| Rejection::Io(e.kind()))?;
    if header.len() < HEADER_SIZE {
        return Err(Rejection::ShortRead(header.len()));
    }
    FileKind::from_magic_bytes(&header).ok_or(Rejection::Unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn padded(head: &[u8], len: usize) -> Vec<u8> {
        let mut bytes = head.to_vec();
        bytes.resize(len, 0x20);
        bytes
    }

    fn epub() -> Vec<u8> {
        let mut bytes = vec![0x50, 0x4B, 0x03, 0x04];
        bytes.resize(30, 0);
        bytes.extend_from_slice(b"mimetypeapplication/epub+zip");
        padded(&bytes, 4096)
    }

    /// A reader that refuses to give anything back.
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }
    impl Seek for Broken {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[rstest]
    #[case(padded(b"%PDF-1.7", 1024), FileKind::Pdf)]
    #[case(padded(b"%PDF-1.7", HEADER_SIZE), FileKind::Pdf)]
    #[case(epub(), FileKind::Epub)]
    fn accepts_supported(#[case] bytes: Vec<u8>, #[case] expected: FileKind) {
        let mut stream = Cursor::new(bytes);
        assert_eq!(classify(&mut stream), Verdict::Accepted(expected));
        assert_eq!(stream.position(), 0);
    }

    #[rstest]
    #[case(padded(b"<!DOCTYPE html>", 1024), Rejection::Unrecognized)]
    #[case(padded(&[0x50, 0x4B, 0x03, 0x04], 1024), Rejection::Unsupported(FileKind::Zip))]
    #[case(padded(&[0x1F, 0x8B, 0x08], 1024), Rejection::Unsupported(FileKind::Gzip))]
    #[case(padded(b"%PDF-1.7", HEADER_SIZE - 1), Rejection::ShortRead(HEADER_SIZE - 1))]
    #[case(vec![], Rejection::ShortRead(0))]
    fn rejects_everything_else(#[case] bytes: Vec<u8>, #[case] expected: Rejection) {
        let mut stream = Cursor::new(bytes);
        assert_eq!(classify(&mut stream), Verdict::Rejected(expected));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn rejects_mobi() {
        let mut bytes = padded(b"Some Palm Database", 60);
        bytes.extend_from_slice(b"BOOKMOBI");
        let mut stream = Cursor::new(padded(&bytes, 1024));
        assert_eq!(classify(&mut stream), Verdict::Rejected(Rejection::Unsupported(FileKind::Mobi)));
    }

    #[test]
    fn restores_non_zero_position() {
        let mut bytes = b"garbage!".to_vec();
        bytes.extend(padded(b"%PDF-2.0", 512));
        let mut stream = Cursor::new(bytes);
        stream.set_position(8);
        assert_eq!(classify(&mut stream), Verdict::Accepted(FileKind::Pdf));
        assert_eq!(stream.position(), 8);
        // The whole file can still be read afterwards.
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), 512);
        assert!(rest.starts_with(b"%PDF-2.0"));
    }

    #[test]
    fn read_failure_is_rejected() {
        let verdict = classify(&mut Broken);
        assert_eq!(verdict, Verdict::Rejected(Rejection::Io(io::ErrorKind::Other)));
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.kind(), None);
    }
}
