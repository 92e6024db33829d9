//! Error types for the `rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// A single file that could not be turned into text.
///
/// Batch ingestion collects these instead of aborting, so each one names the
/// offending file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to load document '{}': {message}", path.display())]
pub struct DocumentLoadError {
    pub path: PathBuf,
    pub message: String,
}

impl DocumentLoadError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Errors that can occur while loading configuration, ingesting documents,
/// or answering a prompt.
#[derive(Debug, Error)]
pub enum RagError {
    /// The configuration file is missing, malformed or inconsistent.
    #[error("configuration error ({path}): {message}")]
    ConfigLoad { path: String, message: String },

    /// The embedding endpoint failed or returned an unusable body.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The generation endpoint failed or returned an unusable body.
    #[error("generation service error: {0}")]
    GenerationService(String),

    /// The vector index could not be created or never became ready.
    #[error("index provisioning error ({index}): {message}")]
    IndexProvisioning { index: String, message: String },

    #[error(transparent)]
    DocumentLoad(#[from] DocumentLoadError),

    /// A query, upsert, delete or stats call against the vector index failed.
    #[error("vector index error during {operation}: {message}")]
    VectorIndex { operation: &'static str, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn vector_index(operation: &'static str, message: impl Into<String>) -> Self {
        RagError::VectorIndex { operation, message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
