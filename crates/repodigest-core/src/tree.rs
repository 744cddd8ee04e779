//! Traversal result container and statistics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::error::ScanWarning;
use crate::node::{Node, NodeKind};

/// Running totals for one traversal.
///
/// Owned by a single scanner in serial mode; wrap it in a lock before
/// sharing it with workers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalStats {
    /// Files recorded so far.
    pub total_files: u64,
    /// Bytes recorded so far.
    pub total_size: u64,
    /// Directories entered.
    pub total_dirs: u64,
    /// Symlinks skipped because they escape the root or cannot be resolved.
    pub skipped_symlinks: u64,
    /// Deepest directory entered.
    pub max_depth: u32,
    /// Canonical paths already visited.
    pub visited: HashSet<PathBuf>,
}

impl TraversalStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_size += size;
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a symlink that was not emitted.
    pub fn record_skipped_symlink(&mut self) {
        self.skipped_symlinks += 1;
    }

    /// Mark a canonical path as visited. Returns `true` the first time.
    pub fn mark_visited(&mut self, canonical: impl Into<PathBuf>) -> bool {
        self.visited.insert(canonical.into())
    }

    /// Check whether a canonical path was already visited.
    pub fn was_visited(&self, canonical: &Path) -> bool {
        self.visited.contains(canonical)
    }
}

/// A content-bearing node flattened out of the tree, in digest order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Position in canonical digest order.
    pub index: usize,
    /// Path relative to the source's local path.
    pub relative_path: PathBuf,
    /// Path to read content from.
    pub absolute_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Resolved target when the entry is a symlink.
    pub link_target: Option<PathBuf>,
}

/// Complete scanned tree with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTree {
    /// Root node of the tree.
    pub root: Node,

    /// Canonical local path of the source (pattern base).
    pub base_path: PathBuf,

    /// Canonical directory that was scanned (base plus subpath).
    pub scan_root: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Configuration used.
    pub config: IngestConfig,

    /// Traversal statistics.
    pub stats: TraversalStats,

    /// Warnings encountered during the scan.
    pub warnings: Vec<ScanWarning>,
}

impl SourceTree {
    /// Create a new source tree.
    pub fn new(
        root: Node,
        base_path: PathBuf,
        scan_root: PathBuf,
        config: IngestConfig,
        stats: TraversalStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            base_path,
            scan_root,
            scanned_at: SystemTime::now(),
            scan_duration,
            config,
            stats,
            warnings,
        }
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size
    }

    /// Get the number of files in the tree.
    pub fn total_files(&self) -> u64 {
        self.root.file_count()
    }

    /// Check if there were any warnings during the scan.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Flatten the tree into content entries, in digest order.
    pub fn files(&self) -> Vec<FileEntry> {
        let mut entries = Vec::with_capacity(self.root.file_count() as usize);
        self.root.for_each_file(&mut |node| {
            entries.push(FileEntry {
                index: entries.len(),
                relative_path: node.relative_path.clone(),
                absolute_path: node.absolute_path.clone(),
                size: node.size,
                link_target: match &node.kind {
                    NodeKind::Symlink { target } => Some(target.clone()),
                    _ => None,
                },
            });
        });
        entries
    }
}
