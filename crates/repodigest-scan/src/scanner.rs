//! Serial breadth-first scanner.
//!
//! The scanner walks the tree with an explicit work queue, so depth is
//! tracked per queued directory and stack usage does not grow with the
//! tree. Its output defines the authoritative file set and order.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::time::Instant;

use compact_str::CompactString;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use repodigest_core::{
    IngestConfig, IngestError, Node, PathFilter, ScanWarning, SourceTree, TraversalStats,
    WarningKind,
};

use crate::guard::{FileAdmission, LinkResolution, SafetyGuard};
use crate::progress::ScanProgress;

/// Files between progress snapshots.
const PROGRESS_INTERVAL: u64 = 1000;

/// Serial scanner producing an ordered node tree.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the directory described by `config`.
    ///
    /// Fails only when the root is missing or is not a directory. Budget
    /// hits, unsafe links and unreadable entries become warnings on the
    /// returned tree.
    pub fn scan(&self, config: &IngestConfig) -> Result<SourceTree, IngestError> {
        let start = Instant::now();
        config.validate_subpath()?;
        let base = config
            .local_path
            .canonicalize()
            .map_err(|e| IngestError::io(&config.local_path, e))?;
        let scan_root = config.scan_root_under(&base);

        let metadata = fs::metadata(&scan_root).map_err(|e| IngestError::io(&scan_root, e))?;
        if !metadata.is_dir() {
            return Err(IngestError::NotADirectory { path: scan_root });
        }
        let resolved_root = scan_root
            .canonicalize()
            .map_err(|e| IngestError::io(&scan_root, e))?;
        if !resolved_root.starts_with(&base) {
            return Err(IngestError::InvalidConfig {
                message: format!("subpath resolves outside the source: {}", config.subpath),
            });
        }

        let filter = PathFilter::new(&base, &config.ignore_patterns, &config.include_patterns)?;
        let guard = SafetyGuard::new(&resolved_root, config);
        let mut ctx = ScanContext::new(config, filter, guard);

        ctx.stats.mark_visited(&resolved_root);
        let root = Node::new_directory(
            root_name(config, &base, &scan_root),
            0,
            config.subpath_relative(),
            &resolved_root,
        );
        ctx.dirs.push(PendingDir {
            node: Some(root),
            parent: None,
            logical_path: scan_root,
            pruned: false,
        });
        ctx.queue.push_back(0);

        while let Some(idx) = ctx.queue.pop_front() {
            self.process_directory(&mut ctx, idx);
            self.report_progress(&ctx, idx, false);
        }
        self.report_progress(&ctx, 0, true);

        let ScanContext {
            mut dirs,
            stats,
            warnings,
            filter,
            ..
        } = ctx;
        let root = assemble(&mut dirs, filter.has_include_patterns()).unwrap_or_else(|| {
            Node::new_directory(
                root_name(config, &base, &resolved_root),
                0,
                config.subpath_relative(),
                &resolved_root,
            )
        });

        let scan_duration = start.elapsed();
        info!(
            "Scanned {}: {} files, {} bytes, {} warning(s) in {:.2}s",
            resolved_root.display(),
            root.file_count(),
            root.size,
            warnings.len(),
            scan_duration.as_secs_f64()
        );

        Ok(SourceTree::new(
            root,
            base,
            resolved_root,
            config.clone(),
            stats,
            scan_duration,
            warnings,
        ))
    }

    /// List one queued directory and record or enqueue its entries.
    fn process_directory(&self, ctx: &mut ScanContext<'_>, idx: usize) {
        let (depth, dir_path, logical) = {
            let pending = &ctx.dirs[idx];
            let Some(node) = pending.node.as_ref() else {
                return;
            };
            (node.depth, node.absolute_path.clone(), pending.logical_path.clone())
        };

        if idx != 0 {
            if let Some(hit) = ctx.guard.check_directory(depth, &ctx.stats) {
                let message = match hit.warning_kind() {
                    WarningKind::DepthLimit => format!(
                        "Skipping deep directory (max depth {} reached)",
                        ctx.config.max_directory_depth
                    ),
                    WarningKind::FileLimit => format!(
                        "Skipping directory: maximum file limit ({}) reached",
                        ctx.config.max_files
                    ),
                    _ => format!(
                        "Skipping directory: maximum total size ({:.1}MB) reached",
                        ctx.config.max_total_size_bytes as f64 / 1024.0 / 1024.0
                    ),
                };
                ctx.warn(&logical, message, hit.warning_kind());
                ctx.dirs[idx].pruned = true;
                return;
            }
        }
        ctx.stats.record_dir(depth);

        let read_dir = match fs::read_dir(&dir_path) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!("Cannot list {}: {e}", logical.display());
                ctx.warnings.push(ScanWarning::read_error(&logical, &e));
                return;
            }
        };

        let mut entries: Vec<DirEntry> = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Cannot read entry in {}: {e}", logical.display());
                    ctx.warnings.push(ScanWarning::read_error(&logical, &e));
                }
            }
        }
        // Real entries claim their canonical paths before any alias does.
        entries.sort_by_cached_key(|entry| {
            let is_link = entry.file_type().is_ok_and(|t| t.is_symlink());
            (is_link, entry.file_name())
        });

        for entry in entries {
            if let EntryOutcome::AbandonDirectory = self.process_entry(ctx, idx, &entry, &logical)
            {
                break;
            }
        }
    }

    /// Classify one entry: filter, then record a leaf or enqueue a directory.
    fn process_entry(
        &self,
        ctx: &mut ScanContext<'_>,
        parent: usize,
        entry: &DirEntry,
        parent_logical: &Path,
    ) -> EntryOutcome {
        let file_name = entry.file_name();
        let logical = parent_logical.join(&file_name);
        let Some(item) = ctx.child_item(parent, &file_name.to_string_lossy(), logical) else {
            return EntryOutcome::Continue;
        };

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!("Cannot stat {}: {e}", item.logical.display());
                ctx.warnings.push(ScanWarning::new(
                    &item.logical,
                    e.to_string(),
                    WarningKind::MetadataError,
                ));
                return EntryOutcome::Continue;
            }
        };

        if file_type.is_symlink() {
            return self.process_symlink(ctx, parent, item);
        }

        let is_dir = file_type.is_dir();
        if !ctx.passes_filters(&item.logical, is_dir) {
            return EntryOutcome::Continue;
        }

        let absolute = entry.path();
        if is_dir {
            ctx.enqueue_dir(parent, item, absolute);
            EntryOutcome::Continue
        } else if file_type.is_file() {
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Cannot stat {}: {e}", item.logical.display());
                    ctx.warnings.push(ScanWarning::new(
                        &item.logical,
                        e.to_string(),
                        WarningKind::MetadataError,
                    ));
                    return EntryOutcome::Continue;
                }
            };
            ctx.record_file(parent, item, size, absolute, None)
        } else {
            debug!("Skipping special file {}", item.logical.display());
            EntryOutcome::Continue
        }
    }

    /// Re-home a safe symlink under its target's kind; skip anything else.
    fn process_symlink(
        &self,
        ctx: &mut ScanContext<'_>,
        parent: usize,
        item: ChildItem,
    ) -> EntryOutcome {
        let target = match ctx.guard.resolve_symlink(&item.logical) {
            LinkResolution::Safe(target) => target,
            LinkResolution::Escapes(target) => {
                debug!(
                    "Skipping symlink {} -> {} outside scan root",
                    item.logical.display(),
                    target.display()
                );
                ctx.stats.record_skipped_symlink();
                ctx.warnings.push(ScanWarning::unsafe_symlink(&item.logical));
                return EntryOutcome::Continue;
            }
            LinkResolution::Unresolvable(e) => {
                debug!("Skipping unresolvable symlink {}: {e}", item.logical.display());
                ctx.stats.record_skipped_symlink();
                ctx.warnings.push(ScanWarning::unsafe_symlink(&item.logical));
                return EntryOutcome::Continue;
            }
        };

        let metadata = match fs::metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {}: {e}", target.display());
                ctx.warnings.push(ScanWarning::new(
                    &item.logical,
                    e.to_string(),
                    WarningKind::MetadataError,
                ));
                return EntryOutcome::Continue;
            }
        };

        let is_dir = metadata.is_dir();
        if !ctx.passes_filters(&item.logical, is_dir) {
            return EntryOutcome::Continue;
        }
        if ctx.stats.was_visited(&target) {
            ctx.already_visited(&item.logical);
            return EntryOutcome::Continue;
        }

        if is_dir {
            ctx.enqueue_dir(parent, item, target);
            EntryOutcome::Continue
        } else if metadata.is_file() {
            let size = metadata.len();
            ctx.record_file(parent, item, size, target.clone(), Some(target))
        } else {
            debug!("Skipping symlink to special file {}", item.logical.display());
            EntryOutcome::Continue
        }
    }

    fn report_progress(&self, ctx: &ScanContext<'_>, idx: usize, finished: bool) {
        if self.progress_tx.receiver_count() == 0 {
            return;
        }
        let files = ctx.stats.total_files;
        let crossed = files / PROGRESS_INTERVAL != ctx.reported_files.get() / PROGRESS_INTERVAL;
        if !finished && !crossed {
            return;
        }
        ctx.reported_files.set(files);
        let _ = self.progress_tx.send(ScanProgress {
            files_scanned: files,
            dirs_scanned: ctx.stats.total_dirs,
            bytes_scanned: ctx.stats.total_size,
            current_path: ctx
                .dirs
                .get(idx)
                .map(|d| d.logical_path.clone())
                .unwrap_or_default(),
            warnings_count: ctx.warnings.len() as u64,
            elapsed: ctx.start.elapsed(),
            finished,
        });
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory waiting in the work queue, or already listed.
struct PendingDir {
    /// Taken out during assembly.
    node: Option<Node>,
    parent: Option<usize>,
    /// Path under the base that filters see.
    logical_path: PathBuf,
    /// Abandoned by a budget; never attached to its parent.
    pruned: bool,
}

/// Name and paths of an entry about to be classified.
struct ChildItem {
    name: CompactString,
    logical: PathBuf,
    relative: PathBuf,
    depth: u32,
}

enum EntryOutcome {
    Continue,
    AbandonDirectory,
}

/// Traversal state threaded through every queued directory.
struct ScanContext<'a> {
    config: &'a IngestConfig,
    filter: PathFilter,
    guard: SafetyGuard,
    stats: TraversalStats,
    warnings: Vec<ScanWarning>,
    dirs: Vec<PendingDir>,
    queue: VecDeque<usize>,
    /// Budget kinds already logged at warning level.
    logged: HashSet<WarningKind>,
    reported_files: std::cell::Cell<u64>,
    start: Instant,
}

impl<'a> ScanContext<'a> {
    fn new(config: &'a IngestConfig, filter: PathFilter, guard: SafetyGuard) -> Self {
        Self {
            config,
            filter,
            guard,
            stats: TraversalStats::new(),
            warnings: Vec::new(),
            dirs: Vec::new(),
            queue: VecDeque::new(),
            logged: HashSet::new(),
            reported_files: std::cell::Cell::new(0),
            start: Instant::now(),
        }
    }

    fn child_item(&self, parent: usize, name: &str, logical: PathBuf) -> Option<ChildItem> {
        let node = self.dirs.get(parent)?.node.as_ref()?;
        Some(ChildItem {
            name: name.into(),
            relative: node.relative_path.join(name),
            logical,
            depth: node.depth + 1,
        })
    }

    /// Exclude check first; include check for files only.
    fn passes_filters(&self, logical: &Path, is_dir: bool) -> bool {
        if self.filter.should_exclude(logical, is_dir) {
            debug!("Excluded by pattern: {}", logical.display());
            return false;
        }
        if !is_dir && !self.filter.should_include(logical, false) {
            debug!("Not matched by include patterns: {}", logical.display());
            return false;
        }
        true
    }

    fn enqueue_dir(&mut self, parent: usize, item: ChildItem, canonical: PathBuf) {
        if !self.stats.mark_visited(&canonical) {
            self.already_visited(&item.logical);
            return;
        }
        let node = Node::new_directory(item.name, item.depth, item.relative, canonical);
        self.dirs.push(PendingDir {
            node: Some(node),
            parent: Some(parent),
            logical_path: item.logical,
            pruned: false,
        });
        self.queue.push_back(self.dirs.len() - 1);
    }

    fn record_file(
        &mut self,
        parent: usize,
        item: ChildItem,
        size: u64,
        absolute: PathBuf,
        link_target: Option<PathBuf>,
    ) -> EntryOutcome {
        if self.stats.was_visited(&absolute) {
            self.already_visited(&item.logical);
            return EntryOutcome::Continue;
        }
        match self.guard.admit_file(size, &self.stats) {
            FileAdmission::Admit => {}
            FileAdmission::FileLimit => {
                let message = format!("Maximum file limit ({}) reached", self.config.max_files);
                self.warn(&item.logical, message, WarningKind::FileLimit);
                return EntryOutcome::AbandonDirectory;
            }
            FileAdmission::TooLarge => {
                let message = format!(
                    "Skipping file: {size} bytes exceeds max file size ({})",
                    self.config.max_file_size
                );
                self.warn(&item.logical, message, WarningKind::FileTooLarge);
                return EntryOutcome::Continue;
            }
            FileAdmission::ExceedsTotal => {
                let message = "Skipping file: would exceed total size limit".to_string();
                self.warn(&item.logical, message, WarningKind::SizeLimit);
                return EntryOutcome::Continue;
            }
        }

        self.stats.mark_visited(&absolute);
        self.stats.record_file(size);
        let node = match link_target {
            Some(target) => Node::new_symlink(item.name, target, size, item.depth, item.relative),
            None => Node::new_file(item.name, size, item.depth, item.relative, absolute),
        };
        if let Some(dir) = self.dirs.get_mut(parent).and_then(|d| d.node.as_mut()) {
            dir.children.push(node);
        }
        EntryOutcome::Continue
    }

    fn already_visited(&mut self, logical: &Path) {
        debug!("Skipping already visited path: {}", logical.display());
        self.warnings.push(ScanWarning::new(
            logical,
            "Already visited",
            WarningKind::AlreadyVisited,
        ));
    }

    /// Record a budget warning; log each kind once at warning level.
    fn warn(&mut self, path: &Path, message: String, kind: WarningKind) {
        if self.logged.insert(kind) {
            warn!("{message}: {}", path.display());
        } else {
            debug!("{message}: {}", path.display());
        }
        self.warnings.push(ScanWarning::new(path, message, kind));
    }
}

/// Attach every collected directory to its parent, deepest first.
///
/// Children are always queued after their parent, so walking the arena in
/// reverse completes each directory before it is aggregated into its
/// parent.
fn assemble(dirs: &mut [PendingDir], prune_empty: bool) -> Option<Node> {
    for idx in (1..dirs.len()).rev() {
        let Some(mut node) = dirs[idx].node.take() else {
            continue;
        };
        if dirs[idx].pruned {
            continue;
        }
        node.sort_children();
        node.update_counts();
        if prune_empty && node.file_count() == 0 {
            continue;
        }
        let parent = dirs[idx].parent;
        if let Some(parent) = parent.and_then(|p| dirs[p].node.as_mut()) {
            parent.children.push(node);
        }
    }

    let mut root = dirs.first_mut()?.node.take()?;
    root.sort_children();
    root.update_counts();
    Some(root)
}

fn root_name(config: &IngestConfig, base: &Path, scan_root: &Path) -> CompactString {
    let name = if !config.is_root_subpath() {
        scan_root.file_name()
    } else if !config.source.slug.is_empty() {
        return config.source.slug.as_str().into();
    } else {
        base.file_name()
    };
    name.map(|n| n.to_string_lossy().into())
        .unwrap_or_else(|| scan_root.to_string_lossy().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    fn names(node: &Node) -> Vec<&str> {
        node.children.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let config = IngestConfig::new(temp.path());

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(tree.stats.total_files, 4);
        assert_eq!(tree.total_files(), 4);
        assert_eq!(tree.root.dir_count(), 3);
        assert_eq!(tree.total_size(), 5 + 17 + 4 + 17);
        assert!(!tree.has_warnings());
    }

    #[test]
    fn test_children_sorted_dirs_first() {
        let temp = create_test_tree();
        let config = IngestConfig::new(temp.path());

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root), vec!["dir1", "dir2", "file1.txt"]);
        assert_eq!(names(&tree.root.children[0]), vec!["subdir", "file2.txt"]);
    }

    #[test]
    fn test_relative_paths_and_depth() {
        let temp = create_test_tree();
        let config = IngestConfig::new(temp.path());

        let tree = Scanner::new().scan(&config).unwrap();
        let subdir = &tree.root.children[0].children[0];
        let file3 = &subdir.children[0];

        assert_eq!(subdir.depth, 2);
        assert_eq!(file3.depth, 3);
        assert_eq!(file3.display_path(), "dir1/subdir/file3.txt");
        assert!(file3.absolute_path.ends_with("dir1/subdir/file3.txt"));
    }

    #[test]
    fn test_ignore_patterns() {
        let temp = create_test_tree();
        let config = IngestConfig::builder()
            .local_path(temp.path())
            .ignore_patterns(vec!["dir2".to_string()])
            .build()
            .unwrap();

        let tree = Scanner::new().scan(&config).unwrap();

        assert!(!tree.root.children.iter().any(|c| c.name.as_str() == "dir2"));
        assert_eq!(tree.total_files(), 3);
    }

    #[test]
    fn test_max_files_abandons_rest() {
        let temp = TempDir::new().unwrap();
        for i in 0..7 {
            fs::write(temp.path().join(format!("f{i}.txt")), "hi").unwrap();
        }
        let mut config = IngestConfig::new(temp.path());
        config.max_files = 2;

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(tree.total_files(), 2);
        assert_eq!(names(&tree.root), vec!["f0.txt", "f1.txt"]);
        assert!(
            tree.warnings
                .iter()
                .any(|w| w.kind == WarningKind::FileLimit)
        );
    }

    #[test]
    fn test_max_files_prunes_queued_directories() {
        let temp = create_test_tree();
        let mut config = IngestConfig::new(temp.path());
        config.max_files = 1;

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(tree.total_files(), 1);
        assert_eq!(names(&tree.root), vec!["file1.txt"]);
    }

    #[test]
    fn test_depth_limit_prunes_branch() {
        let temp = create_test_tree();
        let mut config = IngestConfig::new(temp.path());
        config.max_directory_depth = 1;

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root.children[0]), vec!["file2.txt"]);
        assert_eq!(tree.total_files(), 3);
        assert!(
            tree.warnings
                .iter()
                .any(|w| w.kind == WarningKind::DepthLimit)
        );
    }

    #[test]
    fn test_total_size_skips_whole_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "12345").unwrap();
        fs::write(temp.path().join("b.txt"), "1234567890").unwrap();
        fs::write(temp.path().join("c.txt"), "123").unwrap();
        let mut config = IngestConfig::new(temp.path());
        config.max_total_size_bytes = 9;

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root), vec!["a.txt", "c.txt"]);
        assert_eq!(tree.total_size(), 8);
    }

    #[test]
    fn test_max_file_size_skips_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.txt"), "x".repeat(64)).unwrap();
        fs::write(temp.path().join("small.txt"), "x").unwrap();
        let mut config = IngestConfig::new(temp.path());
        config.max_file_size = 10;

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root), vec!["small.txt"]);
        assert!(
            tree.warnings
                .iter()
                .any(|w| w.kind == WarningKind::FileTooLarge)
        );
    }

    #[test]
    fn test_include_patterns_prune_empty_dirs() {
        let temp = create_test_tree();
        fs::write(temp.path().join("dir2/main.rs"), "fn main() {}").unwrap();
        let config = IngestConfig::new(temp.path())
            .with_patterns(&["*.rs".to_string()], &[])
            .unwrap();

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root), vec!["dir2"]);
        assert_eq!(names(&tree.root.children[0]), vec!["main.rs"]);
    }

    #[test]
    fn test_subpath_restricts_scan() {
        let temp = create_test_tree();
        let mut config = IngestConfig::new(temp.path());
        config.subpath = "/dir1".to_string();

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(tree.root.name.as_str(), "dir1");
        assert_eq!(tree.total_files(), 2);
        assert_eq!(
            tree.root.children[1].display_path(),
            "dir1/file2.txt"
        );
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = TempDir::new().unwrap();
        let config = IngestConfig::new(temp.path().join("nope"));
        assert!(matches!(
            Scanner::new().scan(&config),
            Err(IngestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_file_root_is_error() {
        let temp = create_test_tree();
        let config = IngestConfig::new(temp.path().join("file1.txt"));
        assert!(matches!(
            Scanner::new().scan(&config),
            Err(IngestError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_subpath_outside_root_is_error() {
        let parent = TempDir::new().unwrap();
        let repo = parent.path().join("repo");
        fs::create_dir_all(repo.join("src")).unwrap();
        fs::create_dir_all(parent.path().join("private")).unwrap();
        fs::write(parent.path().join("private/secret.txt"), "outside-data").unwrap();

        let mut config = IngestConfig::new(&repo);
        config.subpath = "/../private".to_string();

        assert!(matches!(
            Scanner::new().scan(&config),
            Err(IngestError::InvalidConfig { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_subpath_through_escaping_link_is_error() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let temp = create_test_tree();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("out")).unwrap();

        let mut config = IngestConfig::new(temp.path());
        config.subpath = "/out".to_string();

        assert!(matches!(
            Scanner::new().scan(&config),
            Err(IngestError::InvalidConfig { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let temp = create_test_tree();
        let root = temp.path();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.join("escape.txt"))
            .unwrap();
        std::os::unix::fs::symlink(root.join("dir2"), root.join("linked")).unwrap();
        std::os::unix::fs::symlink(root.join("file1.txt"), root.join("alias.txt")).unwrap();
        std::os::unix::fs::symlink(root, root.join("dir1/up")).unwrap();

        let tree = Scanner::new().scan(&IngestConfig::new(root)).unwrap();

        let mut paths = Vec::new();
        tree.root.for_each_file(&mut |n| paths.push(n.display_path()));
        assert!(!paths.iter().any(|p| p.contains("escape")));
        assert!(!paths.iter().any(|p| p.contains("up/")));
        assert!(paths.contains(&"file1.txt".to_string()));
        assert!(!paths.contains(&"alias.txt".to_string()));
        assert_eq!(tree.total_files(), 4);
        assert_eq!(tree.stats.skipped_symlinks, 1);

        // dir2 and linked resolve to the same directory; the one visited
        // first keeps it.
        let dirs: Vec<_> = tree
            .root
            .children
            .iter()
            .filter(|c| c.is_dir())
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(dirs, vec!["dir1", "dir2"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_aliases_never_double_count() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("file1.txt"), "0123456789").unwrap();
        std::os::unix::fs::symlink(root.join("file1.txt"), root.join("alias.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("file1.txt"), root.join("zlias.txt")).unwrap();

        let tree = Scanner::new().scan(&IngestConfig::new(root)).unwrap();

        assert_eq!(names(&tree.root), vec!["file1.txt"]);
        assert_eq!(tree.total_files(), 1);
        assert_eq!(tree.total_size(), 10);
        let skipped = tree
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::AlreadyVisited)
            .count();
        assert_eq!(skipped, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_alias_in_other_directory_counts_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("b")).unwrap();
        fs::write(root.join("b/real.txt"), "data").unwrap();
        std::os::unix::fs::symlink(root.join("b/real.txt"), root.join("a/link.txt")).unwrap();

        let tree = Scanner::new().scan(&IngestConfig::new(root)).unwrap();

        assert_eq!(tree.total_files(), 1);
        assert_eq!(tree.total_size(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_rehomed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("real/inner")).unwrap();
        fs::write(root.join("real/inner/x.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real/inner"), root.join("alias")).unwrap();
        let mut config = IngestConfig::new(root);
        config.ignore_patterns.push("real".to_string());

        let tree = Scanner::new().scan(&config).unwrap();

        assert_eq!(names(&tree.root), vec!["alias"]);
        let alias = &tree.root.children[0];
        assert!(alias.is_dir());
        assert_eq!(alias.children[0].display_path(), "alias/x.txt");
    }

    #[test]
    fn test_progress_subscription() {
        let temp = create_test_tree();
        let scanner = Scanner::new();
        let mut rx = scanner.subscribe();

        scanner.scan(&IngestConfig::new(temp.path())).unwrap();

        let mut last = None;
        while let Ok(progress) = rx.try_recv() {
            last = Some(progress);
        }
        let last = last.unwrap();
        assert!(last.finished);
        assert_eq!(last.files_scanned, 4);
    }
}
