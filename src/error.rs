use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown molecule: {0}")]
    UnknownMolecule(String),

    #[error("Cannot resolve mode of {field} over an empty group")]
    EmptyGroup { field: &'static str },

    #[error("Shortlist storage {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
