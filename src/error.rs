//! Error types for the HATS partitioning core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HatsError>;

#[derive(Error, Debug)]
pub enum HatsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted file: {0}")]
    CorruptedFile(std::path::PathBuf),
}

impl From<bincode::Error> for HatsError {
    fn from(err: bincode::Error) -> Self {
        HatsError::Serialization(err.to_string())
    }
}
