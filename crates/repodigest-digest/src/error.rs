//! Error types for digest assembly.

use std::path::PathBuf;

use repodigest_core::IngestError;
use thiserror::Error;

/// Errors that can occur while producing or writing a digest.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Configuration or root-path problem surfaced by ingestion.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The token counter could not encode the text.
    #[error("Token counting failed: {message}")]
    Token { message: String },

    /// The digest file could not be written.
    #[error("Failed to write digest to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for digest operations.
pub type Result<T> = std::result::Result<T, DigestError>;
