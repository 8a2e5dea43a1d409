//! The document library.
//!
//! Uploads are sniffed before anything is stored, payloads go to a storage
//! backend, metadata goes to the catalog, and a cover service is told about
//! every new arrival. [`DocumentService::scan()`] works the other way round,
//! adding catalog rows for files that reached storage some other way.

mod books;
pub mod cover;
mod documents;
pub mod error;

pub use crate::books::BookService;
pub use crate::cover::{CoverHandle, CoverNotifier, HttpCoverNotifier, NoopNotifier};
pub use crate::documents::{
    DEFAULT_ACCESS_URL_TTL, DocumentPatch, DocumentService, NewDocument, SCAN_CHANNEL_CAPACITY, ScanReport,
};
