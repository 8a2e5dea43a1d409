use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shelf_catalog::{Document, DocumentKind};

/// Everything the caller knows about an upload before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Label shown to users. Left empty, the stem of `name` is used.
    pub display_name: String,
    /// Original filename, also used as the storage key.
    pub name: String,
    pub kind: DocumentKind,
    pub description: Option<String>,
}
impl NewDocument {
    pub fn new(name: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            display_name: String::new(),
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a stored document.
///
/// `None` and empty strings both leave the field as it is. `kind` stays raw
/// text until applied so that values outside the closed set are reported as
/// [`UnsupportedKind`](ErrorKind::UnsupportedKind).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
}
impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        [&self.display_name, &self.description, &self.kind].into_iter().all(|field| set(field).is_none())
    }

    /// Merge the set fields into `document`. Nothing is touched unless the
    /// whole patch is valid.
    pub(crate) fn apply(&self, document: &mut Document) -> Result<()> {
        let kind = set(&self.kind)
            .map(|kind| kind.parse::<DocumentKind>().or_raise(|| ErrorKind::UnsupportedKind(kind.to_string())))
            .transpose()?;
        if let Some(display_name) = set(&self.display_name) {
            document.display_name = display_name.to_string();
        }
        if let Some(description) = set(&self.description) {
            document.description = Some(description.to_string());
        }
        if let Some(kind) = kind {
            document.kind = kind;
        }
        Ok(())
    }
}

fn set(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}
