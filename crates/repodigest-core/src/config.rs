//! Ingestion configuration types.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::IngestError;
use crate::filter::parse_patterns;

/// Maximum size of a single file to ingest (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Maximum depth of directory traversal.
pub const MAX_DIRECTORY_DEPTH: u32 = 20;
/// Maximum number of files to ingest.
pub const MAX_FILES: u64 = 10_000;
/// Maximum total bytes of ingested files (500 MiB).
pub const MAX_TOTAL_SIZE_BYTES: u64 = 500 * 1024 * 1024;

/// Prefix for environment overrides of the limits above.
pub const ENV_PREFIX: &str = "REPODIGEST_";

/// Patterns ignored unless explicitly included.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    ".gitmodules",
    // Dependencies and build output
    "node_modules",
    "bower_components",
    "vendor/bundle",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".gradle",
    // Compiled and binary artifacts
    "*.pyc",
    "*.pyo",
    "*.o",
    "*.so",
    "*.dylib",
    "*.dll",
    "*.exe",
    "*.class",
    "*.jar",
    "*.egg-info",
    // Archives and media
    "*.zip",
    "*.tar",
    "*.gz",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.pdf",
    // Lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Cargo.lock",
    // Editors and OS files
    ".idea",
    ".vscode",
    ".DS_Store",
    "*.swp",
    // Generated digests
    "digest.txt",
];

/// Identity of the ingested source, used in the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Short display name (directory name or `user-repo`).
    pub slug: String,
    /// Repository owner, when the source is a cloned repository.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Repository name, when the source is a cloned repository.
    #[serde(default)]
    pub repo_name: Option<String>,
    /// Checked-out branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Checked-out commit.
    #[serde(default)]
    pub commit: Option<String>,
}

impl SourceInfo {
    /// Source info for a plain local directory.
    pub fn local(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Self::default()
        }
    }

    /// Source info for a cloned repository.
    pub fn repository(user_name: impl Into<String>, repo_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        let repo_name = repo_name.into();
        Self {
            slug: format!("{user_name}-{repo_name}"),
            user_name: Some(user_name),
            repo_name: Some(repo_name),
            ..Self::default()
        }
    }
}

/// Configuration for one ingestion run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IngestConfig {
    /// Materialized local directory (or file) of the source.
    pub local_path: PathBuf,

    /// Subtree to restrict the scan to, `/` for the whole source.
    #[builder(default = "String::from(\"/\")")]
    #[serde(default = "default_subpath")]
    pub subpath: String,

    /// Identity shown in the summary.
    #[builder(default)]
    #[serde(default)]
    pub source: SourceInfo,

    /// Glob patterns a file must match (empty = allow all).
    #[builder(default)]
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Glob patterns that exclude an entry.
    #[builder(default = "default_ignore_patterns()")]
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Largest single file to ingest.
    #[builder(default = "default_max_file_size()")]
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum number of files to ingest.
    #[builder(default = "default_max_files()")]
    #[serde(default = "default_max_files")]
    pub max_files: u64,

    /// Maximum total bytes to ingest.
    #[builder(default = "default_max_total_size_bytes()")]
    #[serde(default = "default_max_total_size_bytes")]
    pub max_total_size_bytes: u64,

    /// Maximum directory depth below the scan root.
    #[builder(default = "default_max_directory_depth()")]
    #[serde(default = "default_max_directory_depth")]
    pub max_directory_depth: u32,

    /// Require the scan root to be a single file.
    #[builder(default = "false")]
    #[serde(default)]
    pub single_file: bool,

    /// Read file contents on a worker pool.
    #[builder(default = "false")]
    #[serde(default)]
    pub parallel: bool,

    /// Number of worker threads (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Mask credential-like substrings in file contents.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub redact_secrets: bool,
}

fn default_true() -> bool {
    true
}

fn default_subpath() -> String {
    String::from("/")
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_max_file_size() -> u64 {
    limit_from_env("MAX_FILE_SIZE", MAX_FILE_SIZE)
}

fn default_max_files() -> u64 {
    limit_from_env("MAX_FILES", MAX_FILES)
}

fn default_max_total_size_bytes() -> u64 {
    limit_from_env("MAX_TOTAL_SIZE_BYTES", MAX_TOTAL_SIZE_BYTES)
}

fn default_max_directory_depth() -> u32 {
    limit_from_env("MAX_DIRECTORY_DEPTH", MAX_DIRECTORY_DEPTH)
}

/// Read `REPODIGEST_<key>`, falling back to `default` when unset or invalid.
fn limit_from_env<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    let env_key = format!("{ENV_PREFIX}{key}");
    match std::env::var(&env_key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value for {env_key}: {value}. Using default: {default}");
            default
        }),
        Err(_) => default,
    }
}

impl IngestConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.local_path {
            Some(ref path) if path.as_os_str().is_empty() => {
                return Err("Local path cannot be empty".to_string());
            }
            None => return Err("Local path is required".to_string()),
            _ => {}
        }
        if self.max_files == Some(0) {
            return Err("max_files must be at least 1".to_string());
        }
        if let Some(ref subpath) = self.subpath {
            if subpath.split(['/', '\\']).any(|part| part == "..") {
                return Err(format!("subpath must stay inside the source: {subpath}"));
            }
        }
        Ok(())
    }
}

impl IngestConfig {
    /// Create a new config builder.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Create a default config for a local path.
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        let local_path = local_path.into();
        let slug = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| local_path.to_string_lossy().to_string());

        Self {
            local_path,
            subpath: default_subpath(),
            source: SourceInfo::local(slug),
            include_patterns: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            max_total_size_bytes: default_max_total_size_bytes(),
            max_directory_depth: default_max_directory_depth(),
            single_file: false,
            parallel: false,
            threads: 0,
            redact_secrets: true,
        }
    }

    /// Merge user-supplied include and exclude patterns.
    ///
    /// Patterns may be comma or space separated. An include pattern that is
    /// also in the ignore set is removed from the ignore set.
    pub fn with_patterns(
        mut self,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, IngestError> {
        for pattern in parse_patterns(exclude)? {
            if !self.ignore_patterns.contains(&pattern) {
                self.ignore_patterns.push(pattern);
            }
        }

        let include = parse_patterns(include)?;
        self.ignore_patterns.retain(|p| !include.contains(p));
        for pattern in include {
            if !self.include_patterns.contains(&pattern) {
                self.include_patterns.push(pattern);
            }
        }
        Ok(self)
    }

    /// Whether the scan covers the whole source.
    pub fn is_root_subpath(&self) -> bool {
        self.subpath.trim_matches('/').is_empty()
    }

    /// Subpath relative to `local_path`.
    pub fn subpath_relative(&self) -> PathBuf {
        self.subpath
            .trim_matches('/')
            .split('/')
            .filter(|part| !part.is_empty())
            .collect()
    }

    /// Directory or file the scan starts from.
    pub fn scan_root(&self) -> PathBuf {
        self.scan_root_under(&self.local_path)
    }

    /// Scan root relative to an already-resolved base path.
    pub fn scan_root_under(&self, base: &Path) -> PathBuf {
        let relative = self.subpath_relative();
        if relative.as_os_str().is_empty() {
            base.to_path_buf()
        } else {
            base.join(relative)
        }
    }

    /// Reject a subpath that could step outside `local_path`.
    pub fn validate_subpath(&self) -> Result<(), IngestError> {
        let escapes = self
            .subpath
            .split(['/', '\\'])
            .any(|part| part == "..");
        if escapes {
            return Err(IngestError::InvalidConfig {
                message: format!("subpath must stay inside the source: {}", self.subpath),
            });
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = IngestConfig::builder()
            .local_path("/home/user/repo")
            .max_files(25u64)
            .parallel(true)
            .build()
            .unwrap();

        assert_eq!(config.local_path, PathBuf::from("/home/user/repo"));
        assert_eq!(config.max_files, 25);
        assert!(config.parallel);
        assert!(config.redact_secrets);
        assert_eq!(config.subpath, "/");
    }

    #[test]
    fn test_builder_rejects_missing_path() {
        assert!(IngestConfig::builder().build().is_err());
        assert!(IngestConfig::builder().local_path("").build().is_err());
        assert!(
            IngestConfig::builder()
                .local_path("/repo")
                .max_files(0u64)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_config_simple() {
        let config = IngestConfig::new("/home/user/project");
        assert_eq!(config.source.slug, "project");
        assert!(config.include_patterns.is_empty());
        assert!(config.ignore_patterns.iter().any(|p| p == ".git"));
        assert!(!config.single_file);
    }

    #[test]
    fn test_with_patterns_include_overrides_default_ignore() {
        let config = IngestConfig::new("/repo")
            .with_patterns(&["*.py, Cargo.lock".to_string()], &["*.log".to_string()])
            .unwrap();

        assert!(config.include_patterns.contains(&"*.py".to_string()));
        assert!(config.include_patterns.contains(&"Cargo.lock".to_string()));
        assert!(!config.ignore_patterns.contains(&"Cargo.lock".to_string()));
        assert!(config.ignore_patterns.contains(&"*.log".to_string()));
    }

    #[test]
    fn test_with_patterns_rejects_invalid() {
        let result = IngestConfig::new("/repo").with_patterns(&[], &["src/$(rm)".to_string()]);
        assert!(matches!(result, Err(IngestError::InvalidPattern { .. })));
    }

    #[test]
    fn test_subpath_handling() {
        let mut config = IngestConfig::new("/repo");
        assert!(config.is_root_subpath());
        assert_eq!(config.scan_root(), PathBuf::from("/repo"));

        config.subpath = "/src/core/".to_string();
        assert!(!config.is_root_subpath());
        assert_eq!(config.subpath_relative(), PathBuf::from("src/core"));
        assert_eq!(config.scan_root(), PathBuf::from("/repo/src/core"));
    }

    #[test]
    fn test_root_subpath_adds_no_separator() {
        let config = IngestConfig::new("/repo/notes.md");
        assert_eq!(config.scan_root(), PathBuf::from("/repo/notes.md"));
        assert_eq!(config.scan_root().as_os_str(), "/repo/notes.md");
    }

    #[test]
    fn test_subpath_cannot_leave_source() {
        let mut config = IngestConfig::new("/repo");
        config.subpath = "/../private".to_string();
        assert!(matches!(
            config.validate_subpath(),
            Err(IngestError::InvalidConfig { .. })
        ));

        config.subpath = "/src/..\\..".to_string();
        assert!(config.validate_subpath().is_err());

        config.subpath = "/src/..hidden".to_string();
        assert!(config.validate_subpath().is_ok());

        assert!(
            IngestConfig::builder()
                .local_path("/repo")
                .subpath("/a/../../b")
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_source_info_repository() {
        let source = SourceInfo::repository("octo", "widgets");
        assert_eq!(source.slug, "octo-widgets");
        assert_eq!(source.user_name.as_deref(), Some("octo"));
    }
}
