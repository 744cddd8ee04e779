//! Core types and configuration for repodigest.
//!
//! This crate provides the data structures shared by the scanner and the
//! digest renderer: traversal nodes, statistics, ingestion configuration,
//! the per-root override file, and glob-based path filtering.

mod config;
mod error;
mod filter;
mod node;
mod overrides;
mod tree;

pub use config::{
    DEFAULT_IGNORE_PATTERNS, ENV_PREFIX, IngestConfig, IngestConfigBuilder, MAX_DIRECTORY_DEPTH,
    MAX_FILE_SIZE, MAX_FILES, MAX_TOTAL_SIZE_BYTES, SourceInfo,
};
pub use error::{IngestError, ScanWarning, WarningKind};
pub use filter::{PathFilter, normalize_pattern, parse_patterns};
pub use node::{Node, NodeKind, to_slash};
pub use overrides::{OVERRIDE_FILE_NAME, OverrideFile, OverrideSection, override_path};
pub use tree::{FileEntry, SourceTree, TraversalStats};
