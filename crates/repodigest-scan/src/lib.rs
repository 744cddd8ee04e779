//! Traversal engine for repodigest.
//!
//! # Overview
//!
//! `repodigest-scan` walks a source tree and decides which files end up in
//! a digest. Key features:
//!
//! - **Bounded traversal** with depth, file-count and total-size budgets
//! - **Symlink containment**: links resolving outside the root are skipped
//! - **Parallel per-file work** on a rayon pool with canonical reordering
//! - **Persistent chunk cache** keyed by path and modification time
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use repodigest_scan::{IngestConfig, Scanner};
//!
//! let config = IngestConfig::new("/path/to/repo");
//! let tree = Scanner::new().scan(&config).unwrap();
//!
//! println!("Total files: {}", tree.total_files());
//! for file in tree.files() {
//!     println!("{}", file.relative_path.display());
//! }
//! ```
//!
//! # Parallel processing
//!
//! ```rust,no_run
//! use repodigest_scan::{IngestConfig, ParallelScanner};
//!
//! let config = IngestConfig::new("/path/to/repo");
//! let output = ParallelScanner::new(0)
//!     .run(&config, |file| std::fs::read(&file.absolute_path).map(|b| b.len()))
//!     .unwrap()
//!     .into_canonical();
//!
//! println!("Read {} files", output.completed.len());
//! ```

mod cache;
mod guard;
mod parallel;
mod progress;
mod scanner;

pub use cache::{CACHE_DIR_NAME, CACHE_FILE_NAME, CacheError, ChunkCache, fingerprint};
pub use guard::{FileAdmission, LimitHit, LinkResolution, SafetyGuard, is_safe_path};
pub use parallel::{Completed, FileFailure, MIN_WORKERS, ParallelOutput, ParallelScanner};
pub use progress::ScanProgress;
pub use scanner::Scanner;

// Re-export core types for convenience
pub use repodigest_core::{
    FileEntry, IngestConfig, IngestError, Node, NodeKind, ScanWarning, SourceTree,
    TraversalStats, WarningKind,
};
