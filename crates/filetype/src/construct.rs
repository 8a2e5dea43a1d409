use crate::FileKind;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

const PDF_MAGIC: [u8; 4] = *b"%PDF";
const ZIP_MAGIC: [u8; 2] = *b"PK";
/// Local file header signature of the first zip entry.
const ZIP_LOCAL_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// An EPUB is a zip whose first entry is an uncompressed file called
/// `mimetype`; the entry name and its contents start at offset 30.
const EPUB_MIMETYPE: &[u8; 28] = b"mimetypeapplication/epub+zip";
const EPUB_MIMETYPE_OFFSET: usize = 30;
/// Palm database header: type + creator live at offset 60.
const MOBI_MAGIC: &[u8; 8] = b"BOOKMOBI";
const MOBI_MAGIC_OFFSET: usize = 60;
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

fn has_at(bytes: &[u8], offset: usize, needle: &[u8]) -> bool {
    bytes.get(offset..offset + needle.len()).is_some_and(|window| window == needle)
}

impl FromStr for FileKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(FileKind::Pdf),
            "epub" => Ok(FileKind::Epub),
            "mobi" | "azw" => Ok(FileKind::Mobi),
            "zip" => Ok(FileKind::Zip),
            "gz" | "gzip" => Ok(FileKind::Gzip),
            "bz2" | "bzip2" => Ok(FileKind::Bzip2),
            "xz" | "lzma" => Ok(FileKind::Xz),
            "zst" | "zstd" => Ok(FileKind::Zstd),
            _ => exn::bail!(ErrorKind::UnknownFormat(s.to_string())),
        }
    }
}
impl FileKind {
    /// Detect a file kind from a file extension.
    ///
    /// Returns `None` when the path has no extension or the extension is not
    /// one we know about.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(|ext| ext.parse().ok())
    }

    /// Detect a file kind from magic bytes.
    ///
    /// Returns `None` if no signature matches or if the input is too short to
    /// contain one. Container formats are checked before the generic zip
    /// signature they share.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PDF_MAGIC) {
            return Some(FileKind::Pdf);
        }
        if bytes.starts_with(&ZIP_LOCAL_HEADER) && has_at(bytes, EPUB_MIMETYPE_OFFSET, EPUB_MIMETYPE) {
            return Some(FileKind::Epub);
        }
        if bytes.starts_with(&ZIP_MAGIC)
            && matches!(bytes.get(2), Some(0x03 | 0x05 | 0x07))
            && matches!(bytes.get(3), Some(0x04 | 0x06 | 0x08))
        {
            return Some(FileKind::Zip);
        }
        if has_at(bytes, MOBI_MAGIC_OFFSET, MOBI_MAGIC) {
            return Some(FileKind::Mobi);
        }
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Some(FileKind::Bzip2);
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Some(FileKind::Gzip);
        }
        if bytes.starts_with(&XZ_MAGIC) {
            return Some(FileKind::Xz);
        }
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Some(FileKind::Zstd);
        }
        None
    }
}
