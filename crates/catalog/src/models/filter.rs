use crate::error::{Error, ErrorKind};
use crate::models::DocumentKind;
use derive_more::Display;
use std::str::FromStr;

/// Document columns that can be filtered on.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    #[display("id")]
    Id,
    #[display("display_name")]
    DisplayName,
    #[display("name")]
    Name,
    #[display("path")]
    Path,
    #[display("kind")]
    Kind,
}
impl Field {
    /// Qualified column name. Only ever one of a fixed set of identifiers, so
    /// it is safe to splice into SQL.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Field::Id => "d.id",
            Field::DisplayName => "d.display_name",
            Field::Name => "d.name",
            Field::Path => "d.path",
            Field::Kind => "d.kind",
        }
    }
}
impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => Field::Id,
            "display_name" => Field::DisplayName,
            "name" => Field::Name,
            "path" => Field::Path,
            "kind" | "type" => Field::Kind,
            other => exn::bail!(ErrorKind::UnknownField(other.to_string())),
        })
    }
}

/// Equality predicates over document columns, combined with AND.
///
/// ```
/// use shelf_catalog::{DocumentKind, Field, Filter};
///
/// let filter = Filter::default().kind(DocumentKind::Book).with(Field::DisplayName, "Notes");
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<(Field, String)>,
}
impl Filter {
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.predicates.push((field, value.into()));
        self
    }

    pub fn kind(self, kind: DocumentKind) -> Self {
        self.with(Field::Kind, kind.as_str())
    }

    pub fn predicates(&self) -> &[(Field, String)] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
impl FromIterator<(Field, String)> for Filter {
    fn from_iter<I: IntoIterator<Item = (Field, String)>>(iter: I) -> Self {
        Self { predicates: iter.into_iter().collect() }
    }
}
