//! Books are documents of kind [`Book`](DocumentKind::Book); this is the
//! same service, narrowed.

use crate::documents::{DocumentService, NewDocument, ScanReport};
use crate::error::Result;
use shelf_catalog::{Document, DocumentKind, Filter};
use std::io::{Read, Seek};

#[derive(Clone)]
pub struct BookService {
    documents: DocumentService,
}

impl BookService {
    pub fn new(documents: DocumentService) -> Self {
        Self { documents }
    }

    /// Add an upload as a book, whatever kind the draft says.
    pub async fn add<R>(&self, source: R, draft: NewDocument) -> Result<Document>
    where
        R: Read + Seek + Send + 'static,
    {
        let draft = NewDocument { kind: DocumentKind::Book, ..draft };
        self.documents.add(source, draft).await
    }

    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<Document>> {
        self.documents.find_all(&filter.clone().kind(DocumentKind::Book)).await
    }

    /// Papers are reported as [`NotFound`](crate::error::ErrorKind::NotFound).
    pub async fn find_by_id(&self, id: &str) -> Result<Document> {
        self.documents.find_by_id_where(id, Some(DocumentKind::Book)).await
    }

    pub async fn scan(&self) -> Result<ScanReport> {
        self.documents.scan(DocumentKind::Book).await
    }
}

impl From<DocumentService> for BookService {
    fn from(documents: DocumentService) -> Self {
        Self::new(documents)
    }
}
