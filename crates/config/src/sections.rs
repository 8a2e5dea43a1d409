use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "shelf")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/shelf"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, created on first start.
    pub path: PathBuf,
    /// Connection attempts in total before giving up.
    pub connect_retries: u32,
    pub retry_backoff_secs: u64,
}
impl DatabaseConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("shelf.db"),
            connect_retries: 3,
            retry_backoff_secs: 10,
        }
    }
}

/// Where document payloads live, selected by `backend = "local" | "s3"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        /// Absolute directory; created if missing.
        #[serde(default = "default_root")]
        root: PathBuf,
    },
    S3 {
        #[serde(default)]
        bucket: String,
        /// Key prefix acting as the root of the library inside the bucket.
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        /// For S3-compatible services other than AWS.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        key_id: String,
        #[serde(default)]
        key_secret: String,
    },
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local { root: default_root() }
    }
}

fn default_root() -> PathBuf {
    data_dir().join("documents")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Base URL of the thumbnail service. Without one, new documents are not
    /// announced anywhere.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    #[default]
    Book,
    Paper,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Kind given to documents discovered by a scan.
    pub kind: ScanKind,
}
