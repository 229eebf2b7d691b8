use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParcelError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("launcher failed: {0}")]
    Launch(String),
}

impl ParcelError {
    /// Process exit status for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            ParcelError::Io(_) | ParcelError::Format(_) => 1,
            ParcelError::NotFound(_) => 2,
            ParcelError::CorruptArchive(_) => 3,
            ParcelError::Config(_) => 4,
            ParcelError::Launch(_) => 5,
        }
    }
}

impl From<serde_yaml_ng::Error> for ParcelError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        ParcelError::Config(format!("yaml: {e}"))
    }
}

impl From<serde_json::Error> for ParcelError {
    fn from(e: serde_json::Error) -> Self {
        ParcelError::Format(format!("json: {e}"))
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ParcelError>;
