mod document;
mod filter;

pub use self::document::{Document, DocumentKind};
pub use self::filter::{Field, Filter};
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use sqlx::types::Json;
use time::UtcDateTime;

/// Column representation of a timestamp: Unix nanoseconds, so that
/// `created == updated` survives a round trip.
pub(crate) fn to_nanos(timestamp: UtcDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn from_nanos(nanos: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct DocumentRow {
    id: String,
    display_name: String,
    name: String,
    path: String,
    kind: String,
    description: Option<String>,
    /// JSON array of tag ids in tagging order.
    tags: Json<Vec<String>>,
    created: i64,
    updated: Option<i64>,
}
impl TryFrom<DocumentRow> for Document {
    type Error = Error;
    fn try_from(row: DocumentRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            display_name: row.display_name,
            name: row.name,
            path: row.path,
            kind: row.kind.parse::<DocumentKind>().or_raise(|| ErrorKind::InvalidData("document kind"))?,
            description: row.description,
            tags: row.tags.0,
            created: from_nanos(row.created)?,
            updated: row.updated.map(from_nanos).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str, tags: &[&str]) -> DocumentRow {
        DocumentRow {
            id: "6c4f7a4e-92cb-4d1f-a4a8-02c3c1f1d5e0".to_string(),
            display_name: "Attention Is All You Need".to_string(),
            name: "attention.pdf".to_string(),
            path: "papers/attention.pdf".to_string(),
            kind: kind.to_string(),
            description: None,
            tags: Json(tags.iter().map(|tag| tag.to_string()).collect()),
            created: 1_700_000_000_123_456_789,
            updated: Some(1_700_000_000_123_456_789),
        }
    }

    #[test]
    fn row_to_model() {
        let document = Document::try_from(row("paper", &["ml", "transformers"])).unwrap();
        assert_eq!(document.kind, DocumentKind::Paper);
        assert_eq!(document.tags, vec!["ml", "transformers"]);
        assert_eq!(document.created.unix_timestamp_nanos(), 1_700_000_000_123_456_789);
        assert_eq!(Some(document.created), document.updated);
    }

    #[test]
    fn empty_tags() {
        assert!(Document::try_from(row("book", &[])).unwrap().tags.is_empty());
    }

    #[test]
    fn unknown_kind_is_invalid_data() {
        let err = Document::try_from(row("magazine", &[])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("document kind")));
    }

    #[test]
    fn nanosecond_round_trip() {
        let now = UtcDateTime::now();
        assert_eq!(from_nanos(to_nanos(now).unwrap()).unwrap(), now);
    }
}
