//! Reconcile the catalog with whatever is already sitting in storage.
//!
//! Discovery and insertion run concurrently: a spawned producer walks the
//! backend listing and turns every PDF into a draft document, the catalog
//! drains the drafts as they arrive. The channel between them is bounded, so
//! a slow database holds the listing back instead of buffering it.

use super::DocumentService;
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::TryStreamExt;
use shelf_catalog::{Document, DocumentKind};
use shelf_storage::{BackendHandle, FileInfo, file_stem};
use std::ffi::OsStr;
use std::sync::Arc;
use time::UtcDateTime;
use tokio::sync::mpsc;
use tracing::instrument;
use uuid::Uuid;

/// Drafts in flight between discovery and insertion.
pub const SCAN_CHANNEL_CAPACITY: usize = 16;

/// Only PDFs are picked up by a scan. The match is case-sensitive.
const SCANNED_EXTENSION: &str = "pdf";

/// Outcome of a completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Every file the backend listed.
    pub discovered: u64,
    /// Files listed but not scanned (wrong extension, no usable name).
    pub skipped: u64,
    /// Drafts that became new catalog rows; the rest were already known.
    pub inserted: u64,
}

impl DocumentService {
    /// Insert a catalog row of the given kind for every PDF in storage that
    /// does not have one yet.
    ///
    /// Safe to run repeatedly: known storage keys are left alone. The first
    /// failure on either side ends the scan; rows inserted up to that point
    /// stay.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn scan(&self, kind: DocumentKind) -> Result<ScanReport> {
        let (tx, mut rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let producer = tokio::spawn(discover(Arc::clone(&self.backend), kind, tx));

        let drafts = stream! {
            while let Some(document) = rx.recv().await {
                yield document;
            }
        };
        // Returning drops the receiver, which stops the producer at its next
        // send if it is still running.
        let inserted = match self.repository.upsert_stream(Box::pin(drafts)).await {
            Ok(inserted) => inserted,
            Err(err) => {
                producer.abort();
                return Err(err.raise(ErrorKind::Repository {
                    operation: "upsert",
                    key: self.backend.name().to_string(),
                }));
            },
        };
        let (discovered, skipped) = producer.await.or_raise(|| ErrorKind::Pipeline)??;

        let report = ScanReport { discovered, skipped, inserted };
        tracing::info!(discovered, skipped, inserted, "scan complete");
        Ok(report)
    }
}

/// Producer half: list the backend and send a draft for every scannable
/// file. Returns `(discovered, skipped)`.
async fn discover(backend: BackendHandle, kind: DocumentKind, drafts: mpsc::Sender<Document>) -> Result<(u64, u64)> {
    let (mut discovered, mut skipped) = (0, 0);
    let mut files = backend.list_stream(None);
    while let Some(info) = files.try_next().await.or_raise(|| ErrorKind::Storage {
        operation: "list",
        key: backend.name().to_string(),
    })? {
        discovered += 1;
        let Some(document) = draft(&info, kind, UtcDateTime::now()) else {
            tracing::trace!(path = %info.path.display(), "skipped");
            skipped += 1;
            continue;
        };
        tracing::debug!(path = %document.path, "discovered");
        if drafts.send(document).await.is_err() {
            tracing::debug!("catalog stopped consuming, ending discovery");
            break;
        }
    }
    Ok((discovered, skipped))
}

/// The catalog row a scanned file would get, if it is scannable at all.
fn draft(info: &FileInfo, kind: DocumentKind, now: UtcDateTime) -> Option<Document> {
    if info.path.extension().and_then(OsStr::to_str) != Some(SCANNED_EXTENSION) {
        return None;
    }
    let key = info.key()?;
    let stem = file_stem(key)?;
    Some(Document {
        id: Uuid::new_v4().to_string(),
        display_name: stem.clone(),
        name: stem,
        path: key.to_string(),
        kind,
        description: None,
        tags: Vec::new(),
        created: now,
        updated: None,
    })
}
