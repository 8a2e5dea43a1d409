//! `shelf`: command-line front end to the document library.
//!
//! ```text
//! shelf add ~/Downloads/rust-book.pdf --display-name "The Rust Programming Language"
//! shelf list --kind paper
//! shelf update <ID> --description "Second edition"
//! shelf scan
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `info`).

mod cli;
mod commands;
mod error;

use clap::Parser;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}
