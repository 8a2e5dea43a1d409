use crate::cli::{AddArgs, BookCommand, Cli, Command, FilterArgs, ListArgs, UpdateArgs, UploadArgs};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use shelf_catalog::{Database, Document, DocumentKind, Filter, Repository};
use shelf_config::{Config, ScanKind, StorageConfig};
use shelf_library::{BookService, DocumentPatch, DocumentService, HttpCoverNotifier, NewDocument, ScanReport};
use shelf_storage::BackendHandle;
use shelf_storage::backend::LocalBackend;
#[cfg(feature = "s3")]
use shelf_storage::backend::{S3Backend, S3Settings};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::UtcDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let library = Library::open(&config).await?;
    let outcome = library.execute(cli.command).await;
    library.database.close().await;
    outcome
}

struct Library {
    database: Database,
    documents: DocumentService,
    books: BookService,
    scan_kind: DocumentKind,
}

impl Library {
    #[instrument(skip_all)]
    async fn open(config: &Config) -> Result<Self> {
        let database_path = &config.database.path;
        if let Some(parent) = database_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        }
        let database = Database::connect_with_retry(
            database_path,
            config.database.connect_retries,
            config.database.retry_backoff(),
        )
        .await
        .or_raise(|| ErrorKind::Database)?;

        let backend = backend(&config.storage)?;
        tracing::debug!(backend = backend.name(), "storage ready");
        let mut documents = DocumentService::new(backend, Arc::new(Repository::from(&database)))
            .with_access_url_ttl(config.access_url_ttl());
        if let Some(endpoint) = &config.cover.endpoint {
            let notifier = HttpCoverNotifier::new(endpoint).or_raise(|| ErrorKind::Config)?;
            tracing::debug!(url = notifier.url(), "cover notifications enabled");
            documents = documents.with_notifier(Arc::new(notifier));
        }
        let scan_kind = match config.scan.kind {
            ScanKind::Book => DocumentKind::Book,
            ScanKind::Paper => DocumentKind::Paper,
        };
        Ok(Self {
            database,
            books: BookService::new(documents.clone()),
            documents,
            scan_kind,
        })
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Add(AddArgs { upload, kind }) => {
                let (file, draft) = upload_draft(upload, kind)?;
                let document = self.documents.add(file, draft).await.or_raise(|| ErrorKind::Command("add"))?;
                print_document(&document);
            },
            Command::List(ListArgs { filter, kind }) => {
                let mut filter = to_filter(filter);
                if let Some(kind) = kind {
                    filter = filter.kind(kind);
                }
                let documents = self.documents.find_all(&filter).await.or_raise(|| ErrorKind::Command("list"))?;
                print_rows(&documents);
            },
            Command::Show { id } => {
                let document = self.documents.find_by_id(&id).await.or_raise(|| ErrorKind::Command("show"))?;
                print_document(&document);
            },
            Command::Download { id, output } => self.download(&id, output).await?,
            Command::Update(UpdateArgs { id, display_name, description, kind }) => {
                let patch = DocumentPatch { display_name, description, kind };
                let document =
                    self.documents.update_fields(&id, &patch).await.or_raise(|| ErrorKind::Command("update"))?;
                print_document(&document);
            },
            Command::Delete { id } => {
                self.documents.delete(&id).await.or_raise(|| ErrorKind::Command("delete"))?;
                println!("deleted {id}");
            },
            Command::Scan { kind } => {
                let report = self
                    .documents
                    .scan(kind.unwrap_or(self.scan_kind))
                    .await
                    .or_raise(|| ErrorKind::Command("scan"))?;
                print_report(&report);
            },
            Command::Books(command) => self.execute_books(command).await?,
        }
        Ok(())
    }

    async fn execute_books(&self, command: BookCommand) -> Result<()> {
        match command {
            BookCommand::Add(upload) => {
                let (file, draft) = upload_draft(upload, DocumentKind::Book)?;
                let document = self.books.add(file, draft).await.or_raise(|| ErrorKind::Command("books add"))?;
                print_document(&document);
            },
            BookCommand::List(filter) => {
                let books = self.books.find_all(&to_filter(filter)).await.or_raise(|| ErrorKind::Command("books list"))?;
                print_rows(&books);
            },
            BookCommand::Show { id } => {
                let book = self.books.find_by_id(&id).await.or_raise(|| ErrorKind::Command("books show"))?;
                print_document(&book);
            },
            BookCommand::Scan => {
                let report = self.books.scan().await.or_raise(|| ErrorKind::Command("books scan"))?;
                print_report(&report);
            },
        }
        Ok(())
    }

    async fn download(&self, id: &str, output: PathBuf) -> Result<()> {
        let (document, mut reader) = self.documents.open(id).await.or_raise(|| ErrorKind::Command("download"))?;
        let target = output.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
            let mut file = File::create(&target)?;
            std::io::copy(&mut reader, &mut file)
        })
        .await
        .or_raise(|| ErrorKind::Command("download"))?
        .or_raise(|| ErrorKind::Io(output.clone()))?;
        println!("{} -> {} ({written} bytes)", document.path, output.display());
        Ok(())
    }
}

fn backend(storage: &StorageConfig) -> Result<BackendHandle> {
    let backend: BackendHandle = match storage {
        StorageConfig::Local { root } => Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?),
        #[cfg(feature = "s3")]
        StorageConfig::S3 { bucket, prefix, region, endpoint, key_id, key_secret } => {
            let settings = S3Settings {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                key_id: key_id.clone(),
                key_secret: key_secret.clone(),
            };
            Arc::new(S3Backend::new("s3", settings).or_raise(|| ErrorKind::Storage)?)
        },
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => {
            tracing::error!("S3 storage is configured but this build has no S3 support");
            exn::bail!(ErrorKind::Storage)
        },
    };
    Ok(backend)
}

fn upload_draft(upload: UploadArgs, kind: DocumentKind) -> Result<(File, NewDocument)> {
    let name = match upload.name {
        Some(name) => name,
        None => file_name(&upload.file)?,
    };
    let file = File::open(&upload.file).or_raise(|| ErrorKind::Io(upload.file.clone()))?;
    let mut draft = NewDocument::new(name, kind);
    if let Some(display_name) = upload.display_name {
        draft = draft.with_display_name(display_name);
    }
    if let Some(description) = upload.description {
        draft = draft.with_description(description);
    }
    Ok((file, draft))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_raise(|| ErrorKind::Io(path.to_path_buf()))
}

fn to_filter(args: FilterArgs) -> Filter {
    args.predicates.into_iter().collect()
}

fn timestamp(at: UtcDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn print_rows(documents: &[Document]) {
    for document in documents {
        println!("{}\t{}\t{}\t{}", document.id, document.kind, document.display_name, document.path);
    }
}

fn print_document(document: &Document) {
    println!("id:           {}", document.id);
    println!("display name: {}", document.display_name);
    println!("name:         {}", document.name);
    println!("kind:         {}", document.kind);
    println!("path:         {}", document.path);
    if let Some(description) = &document.description {
        println!("description:  {description}");
    }
    if !document.tags.is_empty() {
        println!("tags:         {}", document.tags.join(", "));
    }
    println!("created:      {}", timestamp(document.created));
    if let Some(updated) = document.updated {
        println!("updated:      {}", timestamp(updated));
    }
}

fn print_report(report: &ScanReport) {
    println!(
        "discovered {} files, skipped {}, inserted {} new documents",
        report.discovered, report.skipped, report.inserted
    );
}
