//! In-memory storage backend for testing.

use super::{BoxSyncRead, BoxSyncWrite, FileInfoStream};
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use crate::StorageBackend;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use time::UtcDateTime;

type ObjectMap = BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>;
type Objects = Arc<RwLock<ObjectMap>>;

fn poisoned() -> exn::Exn<ErrorKind> {
    exn::Exn::from(ErrorKind::Backend("mock storage lock poisoned".to_string()))
}

/// In-memory storage backend for testing.
///
/// Objects live in a sorted map behind a [`RwLock`], so listings come back in
/// key order. The lock is never held across an `.await`. Writes can be made
/// to fail with [`fail_writes()`](Self::fail_writes), and listings cut short
/// with [`fail_listing_after()`](Self::fail_listing_after), to exercise error
/// paths.
///
/// ```
/// use shelf_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("papers/attention.pdf", b"%PDF")]);
/// assert!(backend.exists(Path::new("papers/attention.pdf")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    objects: Objects,
    fail_writes: bool,
    fail_listing_after: Option<usize>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics on keys that fail validation: broken test setup should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = UtcDateTime::now();
        let mut objects = BTreeMap::new();
        for (key, data) in files {
            let key = key.into();
            let Ok(validated) = validate_path(&key) else {
                panic!("MockBackend::with_files: invalid path {}", key.display());
            };
            objects.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            objects: Arc::new(RwLock::new(objects)),
            fail_writes: false,
            fail_listing_after: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent [`writer()`](StorageBackend::writer) call fail.
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Make listings yield an error after `count` entries.
    pub fn fail_listing_after(mut self, count: usize) -> Self {
        self.fail_listing_after = Some(count);
        self
    }

    /// Raw bytes stored under `key`, bypassing the trait.
    pub async fn contents(&self, key: impl AsRef<Path>) -> Option<Vec<u8>> {
        let key = validate_path(key).ok()?;
        self.read().ok()?.get(&key).map(|(_, data)| data.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.read().map(|objects| objects.len()).unwrap_or_default()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ObjectMap>> {
        self.objects.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ObjectMap>> {
        self.objects.write().map_err(|_| poisoned())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

/// Buffers writes and publishes them into the shared map on flush.
struct MockWriter {
    key: PathBuf,
    buffer: Vec<u8>,
    objects: Objects,
}
impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut objects = self.objects.write().map_err(|_| std::io::Error::other("mock storage lock poisoned"))?;
        objects.insert(self.key.clone(), (UtcDateTime::now(), self.buffer.clone()));
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let prefix = match prefix.map(validate_path).transpose() {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            // Snapshot under the lock, then release it before yielding.
            let entries: Result<Vec<FileInfo>> = self.read().map(|guard| {
                guard
                    .iter()
                    .filter(|(key, _)| prefix.as_ref().is_none_or(|pfx| key.starts_with(pfx)))
                    .map(|(key, (modified, data))| FileInfo::new(key.clone(), data.len() as u64, *modified))
                    .collect()
            });
            let entries = match entries {
                Ok(entries) => entries,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            for (index, info) in entries.into_iter().enumerate() {
                if self.fail_listing_after == Some(index) {
                    yield Err(exn::Exn::from(ErrorKind::Backend(format!("listing interrupted after {index} entries"))));
                    return;
                }
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = validate_path(path)?;
        Ok(self.read()?.contains_key(&key))
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let key = validate_path(path)?;
        let guard = self.read()?;
        let (_, data) = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(Box::new(Cursor::new(data.clone())))
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let key = validate_path(path)?;
        if self.fail_writes {
            exn::bail!(ErrorKind::Backend(format!("writes disabled for {}", key.display())));
        }
        Ok(Box::new(MockWriter {
            key,
            buffer: Vec::new(),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let key = validate_path(path)?;
        match self.write()?.remove(&key) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(key)),
        }
    }

    async fn access_url(&self, path: &Path, expires_in: Duration) -> Result<String> {
        let key = validate_path(path)?;
        if !self.read()?.contains_key(&key) {
            exn::bail!(ErrorKind::NotFound(key));
        }
        Ok(format!("mock://{}/{}?expires_in={}", self.name, key.display(), expires_in.as_secs()))
    }
}
