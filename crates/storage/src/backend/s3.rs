//! S3-compatible storage backend.
//!
//! Works against AWS S3 and the usual S3-compatible services (MinIO,
//! Backblaze B2, Tigris). Credentials are given explicitly in
//! [`S3Settings`]; the AWS credential chain is not consulted.

use crate::backend::{BoxSyncRead, BoxSyncWrite, FileInfoStream};
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use crate::StorageBackend;
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, retry::RetryConfig};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use exn::{OptionExt, ResultExt};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Connection settings for an [`S3Backend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    /// Optional key prefix acting as a virtual root directory.
    pub prefix: Option<String>,
    pub region: String,
    /// Custom endpoint for non-AWS services.
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
}

/// S3-compatible storage backend.
///
/// All keys are relative to the configured prefix, if any.
///
/// ```no_run
/// use shelf_storage::backend::{S3Backend, S3Settings};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new("shelf", S3Settings {
///     bucket: "library".to_string(),
///     prefix: Some("documents".to_string()),
///     region: "us-east-1".to_string(),
///     endpoint: Some("http://localhost:9000".to_string()),
///     key_id: "minio".to_string(),
///     key_secret: "minio-secret".to_string(),
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    pub fn new(name: impl Into<String>, settings: S3Settings) -> Result<Self> {
        let prefix = match settings.prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(prefix) => {
                let validated = validate_path(prefix)?;
                let text = validated.to_str().ok_or_raise(|| ErrorKind::InvalidKey(validated.clone()))?;
                Some(text.to_string())
            },
            None => None,
        };
        let credentials = Credentials::new(settings.key_id, settings.key_secret, None, None, "shelf-config");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(settings.region))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing is what S3-compatible services expect.
            .force_path_style(true);
        if let Some(endpoint) = settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
            prefix,
            rate_limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    fn object_key(&self, path: &Path) -> Result<String> {
        let validated = validate_path(path)?;
        let key = validated.to_str().ok_or_raise(|| ErrorKind::InvalidKey(validated.clone()))?;
        Ok(join_key(self.prefix.as_deref(), key))
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.rate_limiter)
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::Backend("S3 rate limiter closed".to_string()))
    }

    /// Listing entry for a bucket key, or `None` if the key is not one this
    /// backend could address again (it would normalise to a different key,
    /// or escape the prefix).
    fn file_info(&self, key: &str, size: Option<i64>, modified: Option<&DateTime>) -> Result<Option<FileInfo>> {
        let relative = strip_key_prefix(self.prefix.as_deref(), key);
        let path = match validate_path(relative) {
            Ok(path) if path.to_str() == Some(relative) => path,
            _ => {
                tracing::warn!(key, "skipping object with a non-canonical key");
                return Ok(None);
            },
        };
        let modified = match modified {
            Some(dt) => UtcDateTime::from_unix_timestamp_nanos(dt.as_nanos())
                .or_raise(|| ErrorKind::Backend(format!("S3 timestamp out of range for {key}")))?,
            None => UtcDateTime::UNIX_EPOCH,
        };
        Ok(Some(FileInfo::new(path, size.unwrap_or_default().max(0) as u64, modified)))
    }

    async fn head(&self, key: &str, path: &Path) -> Result<bool> {
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(e) => Err(sdk_error(e, path)),
        }
    }
}

/// Full object key for a relative key under an optional prefix.
fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

/// Relative key for a full object key; keys outside the prefix come back as is.
fn strip_key_prefix<'k>(prefix: Option<&str>, key: &'k str) -> &'k str {
    match prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => key.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/')).unwrap_or(key),
        None => key,
    }
}

fn sdk_error<E>(error: SdkError<E, HttpResponse>, path: &Path) -> exn::Exn<ErrorKind>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&error).to_string();
    let status = error.raw_response().map(|response| response.status().as_u16());
    let kind = match (&error, status) {
        (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_), _) => ErrorKind::Network(message),
        (_, Some(401 | 403)) => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Backend(message),
    };
    exn::Exn::from(kind)
}

/// Buffers the whole object in memory and uploads it on flush.
///
/// Must be used from a blocking thread: `flush()` blocks on the runtime the
/// writer was created on.
struct S3Writer {
    client: Client,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
    runtime: Handle,
    rate_limiter: Arc<Semaphore>,
}
impl Write for S3Writer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let body = ByteStream::from(self.buffer.clone());
        let request = self.client.put_object().bucket(&self.bucket).key(&self.key).body(body);
        let limiter = Arc::clone(&self.rate_limiter);
        self.runtime.block_on(async move {
            let _permit = limiter.acquire_owned().await.map_err(std::io::Error::other)?;
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|e| std::io::Error::other(DisplayErrorContext(&e).to_string()))
        })
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let list_prefix = match prefix {
            Some(prefix) => match self.object_key(prefix) {
                Ok(key) => Some(format!("{key}/")),
                Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
            },
            None => self.prefix.as_deref().map(|p| format!("{p}/")),
        };

        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let permit = match self.acquire_permit().await {
                    Ok(permit) => permit,
                    Err(e) => { yield Err(e); break; },
                };
                let page = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .set_prefix(list_prefix.clone())
                    .set_continuation_token(continuation.take())
                    .send()
                    .await;
                drop(permit);
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(sdk_error(e, prefix.unwrap_or(Path::new(""))));
                        break;
                    },
                };
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    // Console-created "folders" are zero-byte objects ending in a slash.
                    if key.ends_with('/') {
                        continue;
                    }
                    match self.file_info(key, object.size(), object.last_modified()) {
                        Ok(Some(info)) => yield Ok(info),
                        Ok(None) => {},
                        Err(e) => yield Err(e),
                    }
                }
                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                    _ => break,
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = self.object_key(path)?;
        self.head(&key, path).await
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let key = self.object_key(path)?;
        let _permit = self.acquire_permit().await?;
        let response = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(e) => return Err(sdk_error(e, path)),
        };
        let body = response
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed reading body of {key}")))?;
        Ok(Box::new(Cursor::new(body.into_bytes().to_vec())))
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let key = self.object_key(path)?;
        Ok(Box::new(S3Writer {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key,
            buffer: Vec::new(),
            runtime: Handle::current(),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let key = self.object_key(path)?;
        // S3 deletes are idempotent; check first so a missing key is reported.
        if !self.head(&key, path).await? {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| sdk_error(e, path))?;
        Ok(())
    }

    async fn access_url(&self, path: &Path, expires_in: Duration) -> Result<String> {
        let key = self.object_key(path)?;
        let config = PresigningConfig::expires_in(expires_in)
            .or_raise(|| ErrorKind::Backend(format!("invalid presign duration {expires_in:?}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(config)
            .await
            .map_err(|e| sdk_error(e, path))?;
        Ok(request.uri().to_string())
    }
}
