use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not open the catalog database")]
    Database,
    #[display("could not set up document storage")]
    Storage,
    #[display("{_0} failed")]
    Command(#[error(not(source))] &'static str),
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}
