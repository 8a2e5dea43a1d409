//! SQLite implementation of [`DocumentRepository`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Document, DocumentRow, Filter, to_nanos};
use crate::store::{DocumentRepository, DocumentStream};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

const SELECT_DOCUMENTS: &str = include_str!("../queries/select_documents.sql");

/// Column values for an insert, in statement order.
struct InsertParams<'d> {
    document: &'d Document,
    created: i64,
    updated: Option<i64>,
}
impl<'d> InsertParams<'d> {
    fn new(document: &'d Document) -> Result<Self> {
        Ok(Self {
            document,
            created: to_nanos(document.created)?,
            updated: document.updated.map(to_nanos).transpose()?,
        })
    }

    fn bind<'q>(
        &self,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>
    where
        'd: 'q,
    {
        query
            .bind(self.document.id.as_str())
            .bind(self.document.display_name.as_str())
            .bind(self.document.name.as_str())
            .bind(self.document.path.as_str())
            .bind(self.document.kind.as_str())
            .bind(self.document.description.as_deref())
            .bind(self.created)
            .bind(self.updated)
    }
}

/// SQLite-backed document repository.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach a tag to a document. Tagging twice is a no-op.
    pub async fn tag(&self, document_id: &str, tag_id: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/tag_document.sql"))
            .bind(tag_id)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    fn is_path_conflict(error: &sqlx::Error) -> bool {
        error
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation() && e.message().contains("documents.path"))
    }
}

#[async_trait]
impl DocumentRepository for Repository {
    #[instrument(skip(self), fields(predicates = filter.len()))]
    async fn find_all(&self, filter: &Filter) -> Result<Vec<Document>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_DOCUMENTS);
        for (i, (field, value)) in filter.predicates().iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            query.push(field.column()).push(" = ").push_bind(value.as_str());
        }
        query.push(" ORDER BY d.display_name ASC, d.id ASC");
        let rows: Vec<DocumentRow> =
            query.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_DOCUMENTS);
        query.push(" WHERE d.id = ").push_bind(id);
        let row: Option<DocumentRow> =
            query.build_query_as().fetch_optional(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        row.map(Document::try_from).transpose()
    }

    #[instrument(skip_all, fields(id = %document.id, path = %document.path))]
    async fn insert(&self, document: &Document) -> Result<()> {
        let params = InsertParams::new(document)?;
        let result = params.bind(sqlx::query(include_str!("../queries/insert_document.sql"))).execute(&self.pool).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::is_path_conflict(&e) => exn::bail!(ErrorKind::Duplicate(document.path.clone())),
            Err(e) => Err(e).or_raise(|| ErrorKind::Database),
        }
    }

    #[instrument(skip_all, fields(id = %document.id))]
    async fn update(&self, document: &Document) -> Result<Document> {
        let result = sqlx::query(include_str!("../queries/update_document.sql"))
            .bind(document.display_name.as_str())
            .bind(document.kind.as_str())
            .bind(document.description.as_deref())
            .bind(document.updated.map(to_nanos).transpose()?)
            .bind(document.id.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(document.id.clone()));
        }
        self.find_by_id(&document.id).await?.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(document.id.clone())))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/delete_document.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn upsert_stream(&self, mut documents: DocumentStream<'_>) -> Result<u64> {
        let mut inserted = 0;
        while let Some(document) = documents.next().await {
            let params = InsertParams::new(&document)?;
            let result = params
                .bind(sqlx::query(include_str!("../queries/insert_document_if_absent.sql")))
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
            match result.rows_affected() {
                0 => tracing::trace!(path = %document.path, "already catalogued"),
                _ => {
                    tracing::debug!(id = %document.id, path = %document.path, "catalogued");
                    inserted += 1;
                },
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, Field};
    use time::{Duration, UtcDateTime};

    async fn repository() -> Repository {
        Repository::from(&Database::connect_in_memory().await.unwrap())
    }

    fn document(id: &str, display_name: &str, path: &str, kind: DocumentKind) -> Document {
        let now = UtcDateTime::now();
        Document {
            id: id.to_string(),
            display_name: display_name.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind,
            description: None,
            tags: Vec::new(),
            created: now,
            updated: Some(now),
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_id() {
        let repo = repository().await;
        let doc = document("1", "Rust Book", "rust.pdf", DocumentKind::Book);
        repo.insert(&doc).await.unwrap();
        assert_eq!(repo.find_by_id("1").await.unwrap(), Some(doc));
        assert_eq!(repo.find_by_id("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_duplicate_path() {
        let repo = repository().await;
        repo.insert(&document("1", "A", "same.pdf", DocumentKind::Book)).await.unwrap();
        let err = repo.insert(&document("2", "B", "same.pdf", DocumentKind::Book)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Duplicate(path) if path == "same.pdf"));
    }

    #[tokio::test]
    async fn insert_duplicate_id_is_a_database_error() {
        let repo = repository().await;
        repo.insert(&document("1", "A", "a.pdf", DocumentKind::Book)).await.unwrap();
        let err = repo.insert(&document("1", "B", "b.pdf", DocumentKind::Book)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
    }

    #[tokio::test]
    async fn find_all_filters_and_orders_by_display_name() {
        let repo = repository().await;
        repo.insert(&document("1", "Zebra", "z.pdf", DocumentKind::Book)).await.unwrap();
        repo.insert(&document("2", "Apple", "a.pdf", DocumentKind::Paper)).await.unwrap();
        repo.insert(&document("3", "Mango", "m.pdf", DocumentKind::Book)).await.unwrap();
        repo.insert(&document("0", "Mango", "m2.pdf", DocumentKind::Book)).await.unwrap();

        let all: Vec<_> = repo.find_all(&Filter::default()).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(all, vec!["2", "0", "3", "1"]);

        let books = repo.find_all(&Filter::default().kind(DocumentKind::Book)).await.unwrap();
        assert_eq!(books.len(), 3);
        assert!(books.iter().all(|d| d.kind == DocumentKind::Book));

        let filter = Filter::default().kind(DocumentKind::Book).with(Field::DisplayName, "Mango");
        let mangoes: Vec<_> = repo.find_all(&filter).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(mangoes, vec!["0", "3"]);
    }

    #[tokio::test]
    async fn tags_are_read_in_tagging_order() {
        let repo = repository().await;
        repo.insert(&document("1", "Tagged", "t.pdf", DocumentKind::Paper)).await.unwrap();
        repo.insert(&document("2", "Untagged", "u.pdf", DocumentKind::Paper)).await.unwrap();
        repo.tag("1", "zeta").await.unwrap();
        repo.tag("1", "alpha").await.unwrap();
        repo.tag("1", "zeta").await.unwrap();

        let tagged = repo.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(tagged.tags, vec!["zeta", "alpha"]);
        let untagged = repo.find_by_id("2").await.unwrap().unwrap();
        assert!(untagged.tags.is_empty());
    }

    #[tokio::test]
    async fn tag_ids_keep_separators() {
        let repo = repository().await;
        repo.insert(&document("1", "Tagged", "t.pdf", DocumentKind::Paper)).await.unwrap();
        repo.tag("1", "rust, 2024 edition").await.unwrap();
        repo.tag("1", "say \"hi\"").await.unwrap();

        let tagged = repo.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(tagged.tags, vec!["rust, 2024 edition", "say \"hi\""]);
    }

    #[tokio::test]
    async fn update_persists_mutable_fields_and_keeps_tags() {
        let repo = repository().await;
        let mut doc = document("1", "Draft", "d.pdf", DocumentKind::Book);
        repo.insert(&doc).await.unwrap();
        repo.tag("1", "favourite").await.unwrap();

        doc.display_name = "Final".to_string();
        doc.kind = DocumentKind::Paper;
        doc.description = Some("Camera ready".to_string());
        doc.updated = Some(doc.created + Duration::seconds(5));
        let stored = repo.update(&doc).await.unwrap();

        assert_eq!(stored.display_name, "Final");
        assert_eq!(stored.kind, DocumentKind::Paper);
        assert_eq!(stored.description.as_deref(), Some("Camera ready"));
        assert_eq!(stored.updated, doc.updated);
        assert_eq!(stored.tags, vec!["favourite"]);
        // Immutable fields are never written.
        assert_eq!(stored.path, "d.pdf");
        assert_eq!(stored.created, doc.created);
    }

    #[tokio::test]
    async fn update_unknown_id() {
        let repo = repository().await;
        let err = repo.update(&document("nope", "X", "x.pdf", DocumentKind::Book)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn updated_before_created_is_rejected() {
        let repo = repository().await;
        let mut doc = document("1", "Time", "t.pdf", DocumentKind::Book);
        repo.insert(&doc).await.unwrap();
        doc.updated = Some(doc.created - Duration::seconds(1));
        let err = repo.update(&doc).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
    }

    #[tokio::test]
    async fn delete_removes_row_and_tags() {
        let repo = repository().await;
        repo.insert(&document("1", "Gone", "g.pdf", DocumentKind::Book)).await.unwrap();
        repo.tag("1", "t").await.unwrap();
        repo.delete("1").await.unwrap();
        assert_eq!(repo.find_by_id("1").await.unwrap(), None);
        let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tagged_resources").fetch_one(&repo.pool).await.unwrap();
        assert_eq!(tags, 0);
        assert!(repo.delete("1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn upsert_stream_skips_known_paths() {
        let repo = repository().await;
        repo.insert(&document("existing", "Known", "known.pdf", DocumentKind::Book)).await.unwrap();

        let scanned = vec![
            document("a", "known", "known.pdf", DocumentKind::Book),
            document("b", "new", "new.pdf", DocumentKind::Book),
            document("c", "new again", "new.pdf", DocumentKind::Book),
            document("d", "other", "dir/other.pdf", DocumentKind::Book),
        ];
        let inserted = repo.upsert_stream(Box::pin(futures::stream::iter(scanned.clone()))).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(repo.find_all(&Filter::default()).await.unwrap().len(), 3);
        // The existing row is untouched.
        assert_eq!(repo.find_by_id("existing").await.unwrap().unwrap().display_name, "Known");

        let again = repo.upsert_stream(Box::pin(futures::stream::iter(scanned))).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn upsert_stream_stops_at_first_failure() {
        let repo = repository().await;
        repo.insert(&document("taken", "Taken", "taken.pdf", DocumentKind::Book)).await.unwrap();
        let scanned = vec![
            document("a", "first", "first.pdf", DocumentKind::Book),
            // Same id as an existing row but a new path: a primary key violation.
            document("taken", "clash", "clash.pdf", DocumentKind::Book),
            document("c", "never", "never.pdf", DocumentKind::Book),
        ];
        let err = repo.upsert_stream(Box::pin(futures::stream::iter(scanned))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
        // Inserted before the failure and not rolled back.
        assert!(repo.find_by_id("a").await.unwrap().is_some());
        assert!(repo.find_by_id("c").await.unwrap().is_none());
    }
}
