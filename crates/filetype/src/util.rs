use crate::FileKind;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for FileKind {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl FileKind {
    /// Returns the canonical file extension for this kind (with leading dot).
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => ".pdf",
            FileKind::Epub => ".epub",
            FileKind::Mobi => ".mobi",
            FileKind::Zip => ".zip",
            FileKind::Gzip => ".gz",
            FileKind::Bzip2 => ".bz2",
            FileKind::Xz => ".xz",
            FileKind::Zstd => ".zst",
        }
    }

    /// Returns the short name (for logging and displaying to user).
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Epub => "epub",
            FileKind::Mobi => "mobi",
            FileKind::Zip => "zip",
            FileKind::Gzip => "gzip",
            FileKind::Bzip2 => "bzip2",
            FileKind::Xz => "xz",
            FileKind::Zstd => "zstd",
        }
    }

    /// Returns the IANA media type.
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Epub => "application/epub+zip",
            FileKind::Mobi => "application/x-mobipocket-ebook",
            FileKind::Zip => "application/zip",
            FileKind::Gzip => "application/gzip",
            FileKind::Bzip2 => "application/x-bzip2",
            FileKind::Xz => "application/x-xz",
            FileKind::Zstd => "application/zstd",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::FileKind;
    use rstest::rstest;

    #[rstest]
    #[case(FileKind::Pdf, ".pdf", "application/pdf")]
    #[case(FileKind::Epub, ".epub", "application/epub+zip")]
    #[case(FileKind::Mobi, ".mobi", "application/x-mobipocket-ebook")]
    #[case(FileKind::Zstd, ".zst", "application/zstd")]
    fn test_extension_and_mime(#[case] kind: FileKind, #[case] extension: &str, #[case] mime: &str) {
        assert_eq!(kind.extension(), extension);
        assert_eq!(kind.mime_type(), mime);
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for kind in [FileKind::Pdf, FileKind::Epub, FileKind::Mobi, FileKind::Bzip2] {
            assert_eq!(kind.to_string().parse::<FileKind>().unwrap(), kind);
        }
    }
}
