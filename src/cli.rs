use clap::{Args, Parser, Subcommand};
use shelf_catalog::{DocumentKind, Field};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shelf", author, version, about = "Personal document and book library")]
pub struct Cli {
    /// Configuration file (TOML or YAML). Defaults to `config.toml` and
    /// `config.yaml` in the user configuration directory.
    #[arg(short, long, global = true, env = "SHELF_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a PDF or EPUB into the library.
    Add(AddArgs),
    /// List documents, ordered by display name.
    List(ListArgs),
    /// Show one document with a time-limited link to its file.
    Show { id: String },
    /// Copy a document's file out of storage.
    Download {
        id: String,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Change a document's display name, description or kind.
    Update(UpdateArgs),
    /// Remove a document from the catalog. Its file stays in storage.
    Delete { id: String },
    /// Add catalog entries for PDFs already in storage.
    Scan {
        /// Kind given to new entries [default: from configuration]
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DocumentKind>,
    },
    /// Book-only view of the library.
    #[command(subcommand)]
    Books(BookCommand),
}

#[derive(Debug, Subcommand)]
pub enum BookCommand {
    /// Upload a book.
    Add(UploadArgs),
    List(FilterArgs),
    Show { id: String },
    /// Add book entries for PDFs already in storage.
    Scan,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub file: PathBuf,
    /// Stored name and storage key [default: the file's name]
    #[arg(long)]
    pub name: Option<String>,
    /// [default: the stored name without its extension]
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[command(flatten)]
    pub upload: UploadArgs,
    #[arg(long, default_value = "book", value_parser = parse_kind)]
    pub kind: DocumentKind,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Only documents where FIELD equals VALUE. Fields: id, display_name,
    /// name, path, kind.
    #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_predicate)]
    pub predicates: Vec<(Field, String)>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long, value_parser = parse_kind)]
    pub kind: Option<DocumentKind>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// book or paper
    #[arg(long)]
    pub kind: Option<String>,
}

fn parse_kind(value: &str) -> Result<DocumentKind, String> {
    value.parse().map_err(|_| "expected `book` or `paper`".to_string())
}

fn parse_predicate(value: &str) -> Result<(Field, String), String> {
    let (field, value) = value.split_once('=').ok_or_else(|| "expected FIELD=VALUE".to_string())?;
    let field = field.trim().parse::<Field>().map_err(|err| err.to_string())?;
    Ok((field, value.to_string()))
}
