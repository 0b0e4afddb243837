use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the index manager and its collaborators.
#[derive(Error, Debug)]
pub enum IrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Invalid document id list: {0}")]
    InvalidIdList(String),

    #[error("Corpus format error in {path:?} at line {line}: {reason}")]
    CorpusFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, IrError>;

impl IrError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        IrError::MalformedQuery(reason.into())
    }

    /// Whether the caller can recover by rebuilding from source documents.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, IrError::Io(_) | IrError::Serialization(_) | IrError::Json(_) | IrError::Corrupt(_))
    }
}
