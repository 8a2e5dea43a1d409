//! SQLite catalog of library documents.
//!
//! The catalog holds everything about a document except its bytes: names,
//! kind, description, timestamps, and the storage key where the payload
//! lives. Tags are attached through `tagged_resources` and read back with
//! every document.
//!
//! A storage key appears in at most one row (`UNIQUE(path)`), which is what
//! lets a scan of the storage backend be replayed any number of times.

mod db;
pub mod error;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
pub use crate::models::{Document, DocumentKind, Field, Filter};
pub use crate::repo::Repository;
pub use crate::store::{DocumentRepository, DocumentStream, RepositoryHandle};
