use crate::error::{Error, ErrorKind};
use derive_more::Display;
use std::str::FromStr;
use time::UtcDateTime;

/// The closed set of document kinds.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    #[display("book")]
    Book,
    #[display("paper")]
    Paper,
}
impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Book, DocumentKind::Paper];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Book => "book",
            DocumentKind::Paper => "paper",
        }
    }
}
impl FromStr for DocumentKind {
    type Err = Error;

    /// Exact, lowercase match only; stored values are always lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(DocumentKind::Book),
            "paper" => Ok(DocumentKind::Paper),
            other => exn::bail!(ErrorKind::UnknownKind(other.to_string())),
        }
    }
}

/// A library document as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Opaque unique identifier, never reused.
    pub id: String,
    /// User-editable label.
    pub display_name: String,
    /// Original file name.
    pub name: String,
    /// Storage key of the payload. Single-document lookups through the
    /// library replace this with a time-limited access URL.
    pub path: String,
    pub kind: DocumentKind,
    pub description: Option<String>,
    /// Tag identifiers, in tagging order. Read-only: derived from
    /// `tagged_resources` and never written through a document.
    pub tags: Vec<String>,
    pub created: UtcDateTime,
    pub updated: Option<UtcDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("book", DocumentKind::Book)]
    #[case("paper", DocumentKind::Paper)]
    fn parses_known_kinds(#[case] input: &str, #[case] expected: DocumentKind) {
        assert_eq!(input.parse::<DocumentKind>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("Book")]
    #[case("magazine")]
    #[case(" paper")]
    fn rejects_unknown_kinds(#[case] input: &str) {
        let err = input.parse::<DocumentKind>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownKind(kind) if kind == input));
    }
}
