use super::{DocumentService, NewDocument};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shelf_catalog::{Document, Field, Filter};
use shelf_catalog::error::ErrorKind as CatalogErrorKind;
use shelf_filetype::{Verdict, classify};
use shelf_storage::{file_stem, validate_path};
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::instrument;
use uuid::Uuid;

impl DocumentService {
    /// Store an uploaded file and record it in the catalog.
    ///
    /// The stream is classified from its first few hundred bytes before
    /// anything else happens; a rejected upload leaves no trace. A name whose
    /// storage key is already catalogued or present in storage is refused
    /// before any write, so an upload never replaces another file. Once the
    /// catalog row exists the cover service is notified in the background and
    /// the stored document is returned without waiting for it.
    #[instrument(skip(self, source, draft), fields(name = %draft.name, kind = %draft.kind))]
    pub async fn add<R>(&self, source: R, draft: NewDocument) -> Result<Document>
    where
        R: Read + Seek + Send + 'static,
    {
        let (source, verdict) = tokio::task::spawn_blocking(move || {
            let mut source = source;
            let verdict = classify(&mut source);
            (source, verdict)
        })
        .await
        .or_raise(|| ErrorKind::Pipeline)?;
        let file_kind = match verdict {
            Verdict::Accepted(kind) => kind,
            Verdict::Rejected(reason) => {
                tracing::info!(%reason, "upload rejected");
                exn::bail!(ErrorKind::InvalidFileType { name: draft.name, reason });
            },
        };
        tracing::debug!(%file_kind, "upload accepted");

        let key = validate_path(&draft.name).or_raise(|| ErrorKind::InvalidName(draft.name.clone()))?;
        self.ensure_vacant(&key).await?;
        let stored = self.backend.save(&key, Box::new(source)).await.or_raise(|| ErrorKind::Storage {
            operation: "save",
            key: key.to_string_lossy().into_owned(),
        })?;
        let path = stored.to_string_lossy().into_owned();

        let display_name = match draft.display_name.is_empty() {
            true => file_stem(&path).unwrap_or_else(|| draft.name.clone()),
            false => draft.display_name,
        };
        let now = UtcDateTime::now();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            display_name,
            name: draft.name,
            path,
            kind: draft.kind,
            description: draft.description.filter(|description| !description.is_empty()),
            tags: Vec::new(),
            created: now,
            updated: Some(now),
        };

        if let Err(err) = self.repository.insert(&document).await {
            // A duplicate here means a concurrent upload claimed the key after
            // the vacancy check; the blob is now that row's.
            if matches!(&*err, CatalogErrorKind::Duplicate(_)) {
                return Err(err.raise(ErrorKind::PathTaken(document.path)));
            }
            self.discard(&stored).await;
            return Err(err.raise(ErrorKind::Repository {
                operation: "insert",
                key: document.path,
            }));
        }
        tracing::info!(id = %document.id, path = %document.path, "document added");

        let notifier = Arc::clone(&self.notifier);
        let (id, path) = (document.id.clone(), document.path.clone());
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&id, &path).await {
                tracing::warn!(id, path, error = %err, "cover notification failed");
            }
        });
        Ok(document)
    }

    /// Fail with [`ErrorKind::PathTaken`] if `key` is referenced by a catalog
    /// row or already exists in storage.
    async fn ensure_vacant(&self, key: &Path) -> Result<()> {
        let path = key.to_string_lossy().into_owned();
        let catalogued = self
            .repository
            .find_all(&Filter::default().with(Field::Path, path.clone()))
            .await
            .or_raise(|| ErrorKind::Repository { operation: "find", key: path.clone() })?;
        let stored = self
            .backend
            .exists(key)
            .await
            .or_raise(|| ErrorKind::Storage { operation: "stat", key: path.clone() })?;
        if !catalogued.is_empty() || stored {
            tracing::info!(path, catalogued = !catalogued.is_empty(), stored, "storage path already in use");
            exn::bail!(ErrorKind::PathTaken(path));
        }
        Ok(())
    }

    /// Best-effort removal of a payload whose catalog row never made it.
    async fn discard(&self, key: &Path) {
        match self.backend.delete(key).await {
            Ok(()) => tracing::debug!(key = %key.display(), "removed orphaned payload"),
            Err(err) => tracing::warn!(key = %key.display(), error = %err, "could not remove orphaned payload"),
        }
    }
}
