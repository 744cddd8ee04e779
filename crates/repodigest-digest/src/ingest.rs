//! End-to-end ingestion: scan, load through the cache, redact, format.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use repodigest_core::{FileEntry, IngestConfig, IngestError, SourceTree, to_slash};
use repodigest_scan::{ChunkCache, ParallelScanner, Scanner};

use crate::chunk::{Chunk, chunk_text, join_chunks};
use crate::content::{TOO_LARGE_FILE, read_content, read_error_text};
use crate::error::Result;
use crate::formatter::{Digest, DigestFormatter, FileText};
use crate::redact::SecretRedactor;

/// What the configured root turned out to be.
enum RootKind {
    Directory,
    File { path: PathBuf, size: u64 },
}

/// Runs the ingestion pipeline with a fixed formatter and redactor.
pub struct Ingestor {
    formatter: DigestFormatter,
    redactor: SecretRedactor,
}

impl Ingestor {
    /// Ingestor with the default token counter and detectors.
    pub fn new() -> Self {
        Self {
            formatter: DigestFormatter::new(),
            redactor: SecretRedactor::new(),
        }
    }

    /// Replace the formatter.
    pub fn with_formatter(mut self, formatter: DigestFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Replace the redactor.
    pub fn with_redactor(mut self, redactor: SecretRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// The redactor, e.g. to register extra detectors.
    pub fn redactor(&self) -> &SecretRedactor {
        &self.redactor
    }

    /// Produce the digest for `config`.
    ///
    /// The cache, when given, is read and filled but not flushed; the
    /// caller owns its lifecycle.
    pub fn ingest(&self, config: &IngestConfig, cache: Option<&ChunkCache>) -> Result<Digest> {
        match classify_root(config)? {
            RootKind::File { path, size } => {
                let entry = single_entry(config, path, size);
                let text = if size > config.max_file_size {
                    warn!(
                        "Skipping content of {}: {size} bytes exceeds max file size ({})",
                        entry.relative_path.display(),
                        config.max_file_size
                    );
                    TOO_LARGE_FILE.to_string()
                } else {
                    match self.load_chunks(config, &entry, cache) {
                        Ok(chunks) => join_chunks(&chunks),
                        Err(e) => read_error_text(&e),
                    }
                };
                let file = FileText {
                    relative_path: entry.relative_path,
                    link_target: None,
                    text,
                };
                Ok(self.formatter.format_single_file(config, &file, size))
            }
            RootKind::Directory => {
                let config = with_overrides(config)?;
                let (tree, loaded) = self.load_tree(&config, cache)?;
                let files: Vec<FileText> = tree
                    .files()
                    .into_iter()
                    .zip(loaded)
                    .map(|(entry, chunks)| FileText {
                        text: match chunks {
                            Ok(chunks) => join_chunks(&chunks),
                            Err(cause) => read_error_text(&cause),
                        },
                        relative_path: entry.relative_path,
                        link_target: entry.link_target,
                    })
                    .collect();
                Ok(self.formatter.format_directory(&tree, &files))
            }
        }
    }

    /// All chunks of all discovered files, in tree order.
    ///
    /// Files that could not be read contribute no chunks.
    pub fn ingest_chunks(
        &self,
        config: &IngestConfig,
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<Chunk>> {
        match classify_root(config)? {
            RootKind::File { size, .. } if size > config.max_file_size => Ok(Vec::new()),
            RootKind::File { path, size } => {
                let entry = single_entry(config, path, size);
                Ok(self.load_chunks(config, &entry, cache).unwrap_or_default())
            }
            RootKind::Directory => {
                let config = with_overrides(config)?;
                let (_, loaded) = self.load_tree(&config, cache)?;
                Ok(loaded.into_iter().filter_map(|c| c.ok()).flatten().collect())
            }
        }
    }

    /// Scan and load every file, serially or on the worker pool.
    ///
    /// The returned list is aligned with `tree.files()`; failures carry
    /// their cause so both modes render them the same way.
    fn load_tree(
        &self,
        config: &IngestConfig,
        cache: Option<&ChunkCache>,
    ) -> Result<(SourceTree, Vec<std::result::Result<Vec<Chunk>, String>>)> {
        if config.parallel {
            let output = ParallelScanner::new(config.threads)
                .run(config, |entry| self.load_chunks(config, entry, cache))?
                .into_canonical();

            let mut loaded: Vec<_> = (0..output.tree.total_files() as usize)
                .map(|_| Err(String::new()))
                .collect();
            for done in output.completed {
                if let Some(slot) = loaded.get_mut(done.index) {
                    *slot = Ok(done.value);
                }
            }
            for failure in output.failures {
                if let Some(slot) = loaded.get_mut(failure.index) {
                    *slot = Err(failure.cause);
                }
            }
            log_tree(&output.tree);
            Ok((output.tree, loaded))
        } else {
            let tree = Scanner::new().scan(config)?;
            let loaded = tree
                .files()
                .iter()
                .map(|entry| {
                    self.load_chunks(config, entry, cache).map_err(|e| {
                        warn!("Failed to read {}: {e}", entry.relative_path.display());
                        e.to_string()
                    })
                })
                .collect();
            log_tree(&tree);
            Ok((tree, loaded))
        }
    }

    /// Chunks for one file: cached if fresh, otherwise read and cached.
    /// Redaction runs after the cache so cached payloads stay raw.
    fn load_chunks(
        &self,
        config: &IngestConfig,
        entry: &FileEntry,
        cache: Option<&ChunkCache>,
    ) -> io::Result<Vec<Chunk>> {
        let cached = cache.and_then(|c| c.get::<Vec<Chunk>>(&entry.absolute_path));
        let mut chunks = match cached {
            Some(chunks) => chunks,
            None => {
                let text = read_content(&entry.absolute_path)?.into_text();
                let chunks = chunk_text(&to_slash(&entry.relative_path), &text);
                if let Some(cache) = cache {
                    if let Err(e) = cache.set(&entry.absolute_path, &chunks) {
                        debug!("Not caching {}: {e}", entry.relative_path.display());
                    }
                }
                chunks
            }
        };

        if config.redact_secrets {
            for chunk in &mut chunks {
                if let std::borrow::Cow::Owned(redacted) = self.redactor.redact(&chunk.text) {
                    chunk.text = redacted;
                }
            }
        }
        Ok(chunks)
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new()
    }
}

/// Produce the digest for `config` with default settings.
pub fn ingest(config: &IngestConfig, cache: Option<&ChunkCache>) -> Result<Digest> {
    Ingestor::new().ingest(config, cache)
}

/// Chunks of all discovered files with default settings.
pub fn ingest_chunks(config: &IngestConfig, cache: Option<&ChunkCache>) -> Result<Vec<Chunk>> {
    Ingestor::new().ingest_chunks(config, cache)
}

fn classify_root(config: &IngestConfig) -> std::result::Result<RootKind, IngestError> {
    config.validate_subpath()?;
    let root = config.scan_root();
    let metadata = fs::metadata(&root).map_err(|e| IngestError::io(&root, e))?;

    let base = config
        .local_path
        .canonicalize()
        .map_err(|e| IngestError::io(&config.local_path, e))?;
    let resolved = root.canonicalize().map_err(|e| IngestError::io(&root, e))?;
    if !resolved.starts_with(&base) {
        return Err(IngestError::InvalidConfig {
            message: format!("subpath resolves outside the source: {}", config.subpath),
        });
    }

    if metadata.is_file() {
        Ok(RootKind::File {
            size: metadata.len(),
            path: root,
        })
    } else if config.single_file && metadata.is_dir() {
        Err(IngestError::NotAFile { path: root })
    } else if metadata.is_dir() {
        Ok(RootKind::Directory)
    } else {
        Err(IngestError::NotAFileOrDirectory { path: root })
    }
}

fn single_entry(config: &IngestConfig, path: PathBuf, size: u64) -> FileEntry {
    let relative_path = if config.is_root_subpath() {
        path.file_name().map(PathBuf::from).unwrap_or_else(|| path.clone())
    } else {
        config.subpath_relative()
    };
    FileEntry {
        index: 0,
        relative_path,
        absolute_path: path,
        size,
        link_target: None,
    }
}

fn with_overrides(config: &IngestConfig) -> std::result::Result<IngestConfig, IngestError> {
    let mut config = config.clone();
    let root = config.scan_root();
    config.apply_override_file(&root)?;
    Ok(config)
}

fn log_tree(tree: &SourceTree) {
    info!(
        "Ingested {} file(s), {} bytes, {} warning(s)",
        tree.total_files(),
        tree.total_size(),
        tree.warnings.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_file_flag_on_directory() {
        let temp = TempDir::new().unwrap();
        let mut config = IngestConfig::new(temp.path());
        config.single_file = true;

        assert!(matches!(
            classify_root(&config),
            Err(IngestError::NotAFile { .. })
        ));
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let config = IngestConfig::new(temp.path().join("absent"));
        assert!(matches!(
            classify_root(&config),
            Err(IngestError::NotFound { .. })
        ));
    }

    #[test]
    fn test_subpath_escape_is_rejected() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::create_dir_all(temp.path().join("private")).unwrap();
        std::fs::write(temp.path().join("private/secret.txt"), "outside-data").unwrap();

        let mut config = IngestConfig::new(&repo);
        config.subpath = "/../private".to_string();
        assert!(matches!(
            classify_root(&config),
            Err(IngestError::InvalidConfig { .. })
        ));

        config.subpath = "/../private/secret.txt".to_string();
        assert!(matches!(
            classify_root(&config),
            Err(IngestError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_single_entry_uses_subpath() {
        let mut config = IngestConfig::new("/repo");
        config.subpath = "/src/main.rs".to_string();
        let entry = single_entry(&config, "/repo/src/main.rs".into(), 3);
        assert_eq!(entry.relative_path, PathBuf::from("src/main.rs"));

        let config = IngestConfig::new("/repo/main.rs");
        let entry = single_entry(&config, "/repo/main.rs".into(), 3);
        assert_eq!(entry.relative_path, PathBuf::from("main.rs"));
    }

    #[test]
    fn test_cached_chunks_are_redacted_on_the_way_out() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("env.txt");
        std::fs::write(&file, "TOKEN = \"Xq9Lm2Pz7Rt4Vb8Nc1Wd\"\n").unwrap();
        let cache = ChunkCache::open(temp.path().join("cache.json"));
        let config = IngestConfig::new(temp.path());
        let entry = FileEntry {
            index: 0,
            relative_path: "env.txt".into(),
            absolute_path: file.clone(),
            size: 0,
            link_target: None,
        };

        let ingestor = Ingestor::new();
        let first = ingestor.load_chunks(&config, &entry, Some(&cache)).unwrap();
        let raw: Vec<Chunk> = cache.get(&file).unwrap();
        let second = ingestor.load_chunks(&config, &entry, Some(&cache)).unwrap();

        assert!(raw[0].text.contains("Xq9Lm2Pz7Rt4Vb8Nc1Wd"));
        assert!(!first[0].text.contains("Xq9Lm2Pz7Rt4Vb8Nc1Wd"));
        assert_eq!(first, second);
    }
}
