//! Blob storage for library documents.
//!
//! Document payloads live in a storage backend (local directory, S3-compatible
//! bucket) under a relative key; everything else about a document lives in
//! the catalog database. This crate knows nothing about documents: it saves
//! byte streams under a key, enumerates keys, opens readers, and hands out
//! time-limited URLs.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::{file_stem, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
