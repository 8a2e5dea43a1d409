//! Storage backend trait and implementations.
//!
//! [`StorageBackend`] is the seam between the document library and wherever
//! the bytes actually live: a directory on disk, an S3-compatible bucket, or
//! (in tests) a `HashMap`.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::{S3Backend, S3Settings};
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_trait::async_trait;
use exn::ResultExt;
use futures::{Stream, TryStreamExt};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Unified interface for storage backends.
///
/// # Keys
/// All keys are relative to the storage root and are normalised with
/// [`validate_path`](crate::validate_path) by every implementation before
/// use. A key that would escape the root is an
/// [`InvalidKey`](ErrorKind::InvalidKey) error.
///
/// # Blocking I/O
/// [`reader()`](Self::reader) and [`writer()`](Self::writer) hand back
/// `'static` synchronous handles, meant to be driven inside
/// [`spawn_blocking`](tokio::task::spawn_blocking). The async setup (opening
/// the file, fetching the object) happens before they are returned.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
/// # use shelf_storage::{backend::StorageBackend, error::Result};
/// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
/// let mut stream = backend.list_stream(None);
/// while let Some(info) = stream.try_next().await? {
///     println!("{}: {} bytes", info.path.display(), info.size);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Collects [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata for every file in the backend, optionally restricted to
    /// keys under `prefix`.
    ///
    /// Only files are yielded: directories (and their object-store
    /// equivalents, keys ending in `/`) are walked or skipped. A prefix that
    /// does not exist yields an empty stream rather than an error. Entries
    /// are produced lazily; nothing is buffered beyond a single listing page.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Open a file for streaming reads.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Open a file for streaming writes, creating or replacing it.
    ///
    /// Parent "directories" are created as needed. Callers must `flush()`
    /// before dropping the writer: some backends (S3) buffer everything and
    /// only upload on flush, and errors are only reported there.
    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Produce a URL through which the file can be fetched for the next
    /// `expires_in`.
    ///
    /// Object stores presign a GET request. Backends without a notion of
    /// expiry return a URL that stays valid for as long as the file does.
    async fn access_url(&self, path: &Path, expires_in: Duration) -> Result<String>;

    /// Stream `source` into the backend under `path`, returning the
    /// normalised key the bytes were stored under.
    ///
    /// The copy runs on the blocking pool, so `source` can be any synchronous
    /// reader (an uploaded temp file, an in-memory cursor).
    async fn save(&self, path: &Path, mut source: BoxSyncRead) -> Result<PathBuf> {
        let key = validate_path(path)?;
        let mut sink = self.writer(&key).await?;
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
            let written = std::io::copy(&mut source, &mut sink)?;
            sink.flush()?;
            Ok(written)
        })
        .await
        .or_raise(|| ErrorKind::Backend("blocking copy task failed".to_string()))?
        .map_err(ErrorKind::Io)?;
        tracing::debug!(backend = self.name(), key = %key.display(), bytes = written, "saved file");
        Ok(key)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn save_normalises_key_and_copies_everything() {
        let backend = MockBackend::default();
        let payload = vec![7u8; 64 * 1024];
        let key = backend
            .save(Path::new("./papers//big.pdf"), Box::new(Cursor::new(payload.clone())))
            .await
            .unwrap();
        assert_eq!(key, Path::new("papers/big.pdf"));
        assert_eq!(backend.contents(&key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn save_rejects_escaping_key() {
        let backend = MockBackend::default();
        let err = backend.save(Path::new("../escape.pdf"), Box::new(Cursor::new(vec![1]))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
        assert!(backend.list(None).await.unwrap().is_empty());
    }
}
