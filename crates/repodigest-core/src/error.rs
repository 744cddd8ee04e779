//! Error and warning types for ingestion.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors surfaced to the caller.
///
/// Anything traversal-related (budgets, unsafe links, unreadable files) is
/// reported as a [`ScanWarning`] instead and never aborts the run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Single-file mode was requested but the root is not a file.
    #[error("Path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Root resolves to something that is neither a file nor a directory.
    #[error("Path is neither a file nor a directory: {path}")]
    NotAFileOrDirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A glob pattern was rejected.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The per-root override file could not be read or violates its schema.
    #[error("Invalid override file {path}: {message}")]
    OverrideFile { path: PathBuf, message: String },

    /// The worker pool could not be started.
    #[error("Failed to start worker pool: {message}")]
    WorkerPool { message: String },
}

impl IngestError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Directory deeper than `max_directory_depth` was pruned.
    DepthLimit,
    /// `max_files` was reached; remaining entries were abandoned.
    FileLimit,
    /// A file would have pushed the total past `max_total_size_bytes`.
    SizeLimit,
    /// A single file exceeded `max_file_size`.
    FileTooLarge,
    /// Symlink resolves outside the scan root, or cannot be resolved.
    UnsafeSymlink,
    /// Canonical path was already visited (cycle or duplicate link).
    AlreadyVisited,
    /// Error reading a file or directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

impl WarningKind {
    /// Whether this warning is a resource-budget hit.
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            WarningKind::DepthLimit
                | WarningKind::FileLimit
                | WarningKind::SizeLimit
                | WarningKind::FileTooLarge
        )
    }
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }

    /// Create an unsafe symlink warning.
    pub fn unsafe_symlink(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Skipping symlink outside scan root: {}", path.display()),
            path,
            kind: WarningKind::UnsafeSymlink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_io() {
        let err = IngestError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, IngestError::PermissionDenied { .. }));

        let err = IngestError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, IngestError::NotFound { .. }));
    }

    #[test]
    fn test_budget_kinds() {
        assert!(WarningKind::FileLimit.is_budget());
        assert!(WarningKind::DepthLimit.is_budget());
        assert!(!WarningKind::UnsafeSymlink.is_budget());
        assert!(!WarningKind::ReadError.is_budget());
    }

    #[test]
    fn test_unsafe_symlink_warning() {
        let warning = ScanWarning::unsafe_symlink("/repo/link");
        assert_eq!(warning.kind, WarningKind::UnsafeSymlink);
        assert!(warning.message.contains("/repo/link"));
    }
}
