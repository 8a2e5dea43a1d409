//! The catalog as seen by the document library.

use crate::error::Result;
use crate::models::{Document, Filter};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Documents fed into [`DocumentRepository::upsert_stream()`].
pub type DocumentStream<'a> = Pin<Box<dyn Stream<Item = Document> + Send + 'a>>;

pub type RepositoryHandle = Arc<dyn DocumentRepository + Send + Sync>;

/// Persistence for [`Document`] records.
///
/// Implementations own every persisted row; callers only ever hold copies.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Documents matching every predicate in `filter`, ordered by display
    /// name (ties broken by id).
    async fn find_all(&self, filter: &Filter) -> Result<Vec<Document>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>>;

    /// Insert a new document.
    ///
    /// Fails with [`Duplicate`](crate::error::ErrorKind::Duplicate) if a
    /// document already references the same path.
    async fn insert(&self, document: &Document) -> Result<()>;

    /// Persist the mutable fields of `document` (display name, kind,
    /// description, updated timestamp) and return the stored record.
    ///
    /// Fails with [`NotFound`](crate::error::ErrorKind::NotFound) if no
    /// document has that id.
    async fn update(&self, document: &Document) -> Result<Document>;

    /// Delete a document by id. Tags referencing it go with it.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Insert each document whose path is not yet recorded, returning how
    /// many were inserted.
    ///
    /// Consumes the stream until it ends or an insert fails. Documents
    /// inserted before a failure stay inserted.
    async fn upsert_stream(&self, documents: DocumentStream<'_>) -> Result<u64>;
}
