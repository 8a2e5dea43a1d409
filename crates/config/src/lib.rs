//! Layered configuration.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. built-in defaults,
//! 2. `config.toml` then `config.yaml` in the user's configuration
//!    directory, or a single file given explicitly,
//! 3. environment variables prefixed with `SHELF_`, using `__` to reach into
//!    sections (`SHELF_DATABASE__PATH`, `SHELF_STORAGE__BACKEND`).
//!
//! ```toml
//! access_url_ttl_secs = 54000
//!
//! [database]
//! path = "/var/lib/shelf/shelf.db"
//!
//! [storage]
//! backend = "s3"
//! bucket = "library"
//! endpoint = "https://minio.internal:9000"
//! key_id = "shelf"
//! key_secret = "..."
//!
//! [cover]
//! endpoint = "covers.internal"
//! ```

pub mod error;
mod sections;

pub use crate::sections::{CoverConfig, DatabaseConfig, ScanConfig, ScanKind, StorageConfig};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SHELF_";
/// 15 hours.
pub const DEFAULT_ACCESS_URL_TTL_SECS: u64 = 15 * 60 * 60;
/// Presigned S3 URLs cannot outlive a week.
const MAX_ACCESS_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cover: CoverConfig,
    /// Validity of URLs handed out for single-document lookups.
    pub access_url_ttl_secs: u64,
    pub scan: ScanConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            cover: CoverConfig::default(),
            access_url_ttl_secs: DEFAULT_ACCESS_URL_TTL_SECS,
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from every source.
    ///
    /// An explicit `file` replaces the per-user configuration files and must
    /// exist. Its format follows its extension: `.yaml`/`.yml` or TOML.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::extract(Self::figment(file)?)
    }

    /// Every source merged, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
                }
                tracing::debug!(path = %path.display(), "reading configuration file");
                figment = match path.extension().and_then(|ext| ext.to_str()) {
                    Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                    _ => figment.merge(Toml::file(path)),
                };
            },
            None => {
                if let Some(dirs) = sections::project_dirs() {
                    let dir = dirs.config_dir();
                    figment = figment.merge(Toml::file(dir.join("config.toml"))).merge(Yaml::file(dir.join("config.yaml")));
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn access_url_ttl(&self) -> Duration {
        Duration::from_secs(self.access_url_ttl_secs)
    }

    /// Reject values that would only fail later, once something is already
    /// half done.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &'static str| -> Result<()> {
            Err(exn::Exn::from(ErrorKind::Invalid { field, reason }))
        };
        if self.database.path.as_os_str().is_empty() {
            return invalid("database.path", "must not be empty");
        }
        match &self.storage {
            StorageConfig::Local { root } if !root.is_absolute() => {
                return invalid("storage.root", "must be an absolute path");
            },
            StorageConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
                return invalid("storage.bucket", "must not be empty");
            },
            StorageConfig::S3 { key_id, key_secret, .. } if key_id.is_empty() || key_secret.is_empty() => {
                return invalid("storage.key_id", "S3 credentials are required");
            },
            _ => {},
        }
        if self.cover.endpoint.as_deref().is_some_and(|endpoint| endpoint.trim().is_empty()) {
            return invalid("cover.endpoint", "must not be empty when set");
        }
        if !(1..=MAX_ACCESS_URL_TTL_SECS).contains(&self.access_url_ttl_secs) {
            return invalid("access_url_ttl_secs", "must be between one second and seven days");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::path::PathBuf;

    fn s3(bucket: &str, key_id: &str, key_secret: &str) -> StorageConfig {
        StorageConfig::S3 {
            bucket: bucket.to_string(),
            prefix: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.access_url_ttl(), Duration::from_secs(54_000));
        assert_eq!(config.database.connect_retries, 3);
        assert_eq!(config.database.retry_backoff(), Duration::from_secs(10));
        assert_eq!(config.scan.kind, ScanKind::Book);
        assert!(matches!(config.storage, StorageConfig::Local { ref root } if root.is_absolute()));
    }

    #[test]
    fn toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "shelf.toml",
                r#"
                    access_url_ttl_secs = 600

                    [database]
                    path = "/srv/shelf/catalog.db"

                    [storage]
                    backend = "s3"
                    bucket = "library"
                    prefix = "documents"
                    endpoint = "http://localhost:9000"
                    key_id = "shelf"
                    key_secret = "hunter2"

                    [scan]
                    kind = "paper"
                "#,
            )?;
            let config = Config::load(Some(Path::new("shelf.toml"))).unwrap();
            assert_eq!(config.access_url_ttl_secs, 600);
            assert_eq!(config.database.path, PathBuf::from("/srv/shelf/catalog.db"));
            // Unset keys in a section keep their defaults.
            assert_eq!(config.database.connect_retries, 3);
            assert_eq!(config.scan.kind, ScanKind::Paper);
            let StorageConfig::S3 { bucket, prefix, region, endpoint, .. } = config.storage else {
                panic!("expected S3 storage");
            };
            assert_eq!(bucket, "library");
            assert_eq!(prefix.as_deref(), Some("documents"));
            assert_eq!(region, "us-east-1");
            assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
            Ok(())
        });
    }

    #[test]
    fn yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "shelf.yaml",
                "storage:\n  backend: local\n  root: /srv/shelf/documents\ncover:\n  endpoint: covers.internal\n",
            )?;
            let config = Config::load(Some(Path::new("shelf.yaml"))).unwrap();
            assert_eq!(config.storage, StorageConfig::Local { root: PathBuf::from("/srv/shelf/documents") });
            assert_eq!(config.cover.endpoint.as_deref(), Some("covers.internal"));
            Ok(())
        });
    }

    #[test]
    fn environment_wins_over_file() {
        Jail::expect_with(|jail| {
            jail.create_file("shelf.toml", "[database]\nconnect_retries = 5\nretry_backoff_secs = 1\n")?;
            jail.set_env("SHELF_DATABASE__CONNECT_RETRIES", "7");
            jail.set_env("SHELF_ACCESS_URL_TTL_SECS", "120");
            jail.set_env("SHELF_SCAN__KIND", "paper");
            let config = Config::load(Some(Path::new("shelf.toml"))).unwrap();
            assert_eq!(config.database.connect_retries, 7);
            assert_eq!(config.database.retry_backoff_secs, 1);
            assert_eq!(config.access_url_ttl_secs, 120);
            assert_eq!(config.scan.kind, ScanKind::Paper);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        Jail::expect_with(|_| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::MissingFile(path) if path == Path::new("missing.toml")));
            Ok(())
        });
    }

    #[test]
    fn unknown_scan_kind_fails_to_load() {
        Jail::expect_with(|jail| {
            jail.create_file("shelf.toml", "[scan]\nkind = \"magazine\"\n")?;
            let err = Config::load(Some(Path::new("shelf.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case::relative_root(StorageConfig::Local { root: PathBuf::from("documents") }, "storage.root")]
    #[case::empty_bucket(s3(" ", "id", "secret"), "storage.bucket")]
    #[case::no_key_id(s3("library", "", "secret"), "storage.key_id")]
    #[case::no_secret(s3("library", "id", ""), "storage.key_id")]
    fn invalid_storage(#[case] storage: StorageConfig, #[case] expected: &str) {
        let config = Config { storage, ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field, .. } if *field == expected));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(MAX_ACCESS_URL_TTL_SECS, true)]
    #[case(MAX_ACCESS_URL_TTL_SECS + 1, false)]
    fn access_url_ttl_bounds(#[case] secs: u64, #[case] valid: bool) {
        let config = Config { access_url_ttl_secs: secs, ..Config::default() };
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn blank_cover_endpoint() {
        let config = Config { cover: CoverConfig { endpoint: Some(String::new()) }, ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "cover.endpoint", .. }));
    }

    #[test]
    fn valid_s3() {
        let config = Config { storage: s3("library", "id", "secret"), ..Config::default() };
        config.validate().unwrap();
    }
}
