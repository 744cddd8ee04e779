//! Symlink containment and resource-budget checks.

use std::io;
use std::path::{Path, PathBuf};

use repodigest_core::{IngestConfig, TraversalStats, WarningKind};

/// A budget that stops a directory from being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitHit {
    /// Directory is deeper than `max_directory_depth`.
    Depth,
    /// `max_files` already reached.
    Files,
    /// `max_total_size_bytes` already reached.
    TotalSize,
}

impl LimitHit {
    /// Warning kind recorded for this hit.
    pub fn warning_kind(&self) -> WarningKind {
        match self {
            LimitHit::Depth => WarningKind::DepthLimit,
            LimitHit::Files => WarningKind::FileLimit,
            LimitHit::TotalSize => WarningKind::SizeLimit,
        }
    }
}

/// Outcome of the per-file budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAdmission {
    /// Record the file.
    Admit,
    /// `max_files` reached; abandon the rest of the directory.
    FileLimit,
    /// The file alone exceeds `max_file_size`; skip it.
    TooLarge,
    /// The file would push the total past `max_total_size_bytes`; skip it.
    ExceedsTotal,
}

/// Result of resolving a symlink against the scan root.
#[derive(Debug)]
pub enum LinkResolution {
    /// Target is the root or lies under it.
    Safe(PathBuf),
    /// Target lies outside the root.
    Escapes(PathBuf),
    /// Target is missing or the link chain loops.
    Unresolvable(io::Error),
}

/// Enforces depth, file-count and size budgets plus symlink containment.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    resolved_root: PathBuf,
    max_depth: u32,
    max_files: u64,
    max_total_size: u64,
    max_file_size: u64,
}

impl SafetyGuard {
    /// Create a guard for a canonical scan root.
    pub fn new(resolved_root: impl Into<PathBuf>, config: &IngestConfig) -> Self {
        Self {
            resolved_root: resolved_root.into(),
            max_depth: config.max_directory_depth,
            max_files: config.max_files,
            max_total_size: config.max_total_size_bytes,
            max_file_size: config.max_file_size,
        }
    }

    /// Canonical scan root.
    pub fn resolved_root(&self) -> &Path {
        &self.resolved_root
    }

    /// Check budgets before processing a queued directory.
    pub fn check_directory(&self, depth: u32, stats: &TraversalStats) -> Option<LimitHit> {
        if depth > self.max_depth {
            Some(LimitHit::Depth)
        } else if stats.total_files >= self.max_files {
            Some(LimitHit::Files)
        } else if stats.total_size >= self.max_total_size {
            Some(LimitHit::TotalSize)
        } else {
            None
        }
    }

    /// Check budgets before recording a file. Nothing is accumulated here.
    pub fn admit_file(&self, size: u64, stats: &TraversalStats) -> FileAdmission {
        if stats.total_files >= self.max_files {
            FileAdmission::FileLimit
        } else if size > self.max_file_size {
            FileAdmission::TooLarge
        } else if stats.total_size.saturating_add(size) > self.max_total_size {
            FileAdmission::ExceedsTotal
        } else {
            FileAdmission::Admit
        }
    }

    /// Whether a canonical path is the root or below it.
    pub fn is_contained(&self, resolved: &Path) -> bool {
        resolved.starts_with(&self.resolved_root)
    }

    /// Fully resolve a symlink and classify its target.
    pub fn resolve_symlink(&self, link: &Path) -> LinkResolution {
        match link.canonicalize() {
            Ok(target) if self.is_contained(&target) => LinkResolution::Safe(target),
            Ok(target) => LinkResolution::Escapes(target),
            Err(e) => LinkResolution::Unresolvable(e),
        }
    }
}

/// Whether `target`, once resolved, stays within `base`.
///
/// Unresolvable targets (missing, looping) are unsafe.
pub fn is_safe_path(base: &Path, target: &Path) -> bool {
    let Ok(base) = base.canonicalize() else {
        return false;
    };
    match target.canonicalize() {
        Ok(resolved) => resolved.starts_with(&base),
        Err(_) => false,
    }
}
