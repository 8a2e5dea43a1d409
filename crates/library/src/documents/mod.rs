//! The document service: everything a client can do to the library.
//!
//! A [`DocumentService`] ties together the storage backend holding document
//! payloads, the catalog holding their metadata, and the cover service that
//! wants to hear about new arrivals. Both halves of a document are written
//! by this service alone; callers only ever see [`Document`] copies.

mod add;
mod models;
mod scan;

pub use self::models::{DocumentPatch, NewDocument};
pub use self::scan::{SCAN_CHANNEL_CAPACITY, ScanReport};
use crate::cover::{CoverHandle, NoopNotifier};
use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use shelf_catalog::error::Error as CatalogError;
use shelf_catalog::{Document, DocumentKind, Filter, RepositoryHandle};
use shelf_storage::BackendHandle;
use shelf_storage::backend::BoxSyncRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

/// How long a URL handed out by [`DocumentService::find_by_id()`] stays
/// usable.
pub const DEFAULT_ACCESS_URL_TTL: Duration = Duration::from_secs(15 * 60 * 60);

#[derive(Clone)]
pub struct DocumentService {
    backend: BackendHandle,
    repository: RepositoryHandle,
    notifier: CoverHandle,
    access_url_ttl: Duration,
}

impl DocumentService {
    pub fn new(backend: BackendHandle, repository: RepositoryHandle) -> Self {
        Self {
            backend,
            repository,
            notifier: Arc::new(NoopNotifier),
            access_url_ttl: DEFAULT_ACCESS_URL_TTL,
        }
    }

    pub fn with_notifier(mut self, notifier: CoverHandle) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_access_url_ttl(mut self, ttl: Duration) -> Self {
        self.access_url_ttl = ttl;
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Documents matching `filter`, ordered by display name. Paths are raw
    /// storage keys.
    #[instrument(skip(self), fields(predicates = filter.len()))]
    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<Document>> {
        self.repository.find_all(filter).await.or_raise(|| ErrorKind::Repository {
            operation: "list",
            key: "documents".to_string(),
        })
    }

    /// A single document, with `path` replaced by a time-limited URL to its
    /// payload.
    pub async fn find_by_id(&self, id: &str) -> Result<Document> {
        self.find_by_id_where(id, None).await
    }

    /// [`find_by_id()`](Self::find_by_id), treating documents of any other
    /// kind than `kind` as missing.
    #[instrument(skip(self))]
    pub(crate) async fn find_by_id_where(&self, id: &str, kind: Option<DocumentKind>) -> Result<Document> {
        let mut document = self.lookup(id).await?;
        if kind.is_some_and(|kind| kind != document.kind) {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        document.path = self
            .backend
            .access_url(Path::new(&document.path), self.access_url_ttl)
            .await
            .or_raise(|| ErrorKind::Storage {
                operation: "sign",
                key: document.path.clone(),
            })?;
        Ok(document)
    }

    /// A document together with a reader over its payload.
    ///
    /// The reader is synchronous; drive it from a blocking context.
    #[instrument(skip(self))]
    pub async fn open(&self, id: &str) -> Result<(Document, BoxSyncRead)> {
        let document = self.lookup(id).await?;
        let reader = self.backend.reader(Path::new(&document.path)).await.or_raise(|| ErrorKind::Storage {
            operation: "open",
            key: document.path.clone(),
        })?;
        Ok((document, reader))
    }

    /// Apply `patch` to the document `id` and return the stored result.
    ///
    /// The document must exist and the patch must be valid before anything
    /// is written. `updated` is refreshed on every call.
    #[instrument(skip(self, patch))]
    pub async fn update_fields(&self, id: &str, patch: &DocumentPatch) -> Result<Document> {
        let mut document = self.lookup(id).await?;
        patch.apply(&mut document)?;
        document.updated = Some(UtcDateTime::now().max(document.created));
        let document = self
            .repository
            .update(&document)
            .await
            .map_err(|err| repository_error(err, "update", id))?;
        tracing::info!(id, "document updated");
        Ok(document)
    }

    /// Remove the document's catalog entry. The payload stays in storage.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await.map_err(|err| repository_error(err, "delete", id))?;
        tracing::info!(id, "document deleted");
        Ok(())
    }

    async fn lookup(&self, id: &str) -> Result<Document> {
        self.repository
            .find_by_id(id)
            .await
            .or_raise(|| ErrorKind::Repository {
                operation: "find",
                key: id.to_string(),
            })?
            .ok_or_raise(|| ErrorKind::NotFound(id.to_string()))
    }
}

/// Keep "no such document" distinguishable from the catalog failing.
fn repository_error(err: CatalogError, operation: &'static str, id: &str) -> Error {
    let kind = match err.is_not_found() {
        true => ErrorKind::NotFound(id.to_string()),
        false => ErrorKind::Repository {
            operation,
            key: id.to_string(),
        },
    };
    err.raise(kind)
}
