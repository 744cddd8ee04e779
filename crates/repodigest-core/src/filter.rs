//! Glob-based include/exclude filtering of root-relative paths.
//!
//! The dialect is `fnmatch` without `FNM_PATHNAME`: `*` and `?` also match
//! `/`, `**` is accepted, and matching is case-sensitive. A pattern with no
//! `/` in it additionally matches an entry's own name, so `node_modules`
//! prunes the directory at any depth.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::IngestError;
use crate::node::to_slash;

/// Characters allowed in user-supplied patterns besides alphanumerics.
const PATTERN_CHARS: &str = "-_./+*@";

/// Normalize a pattern: strip a leading `/`, and turn a trailing `/` into
/// a wildcard suffix.
pub fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim().replace('\\', "/");
    let pattern = pattern.trim_start_matches('/');
    match pattern.strip_suffix('/') {
        Some(dir) => format!("{}/*", dir.trim_end_matches('/')),
        None => pattern.to_string(),
    }
}

/// Split comma/space separated pattern strings and validate them.
pub fn parse_patterns(raw: &[String]) -> Result<Vec<String>, IngestError> {
    let mut patterns: Vec<String> = Vec::new();
    for chunk in raw {
        for part in chunk.split([',', ' ']) {
            let part = part.trim().replace('\\', "/");
            if part.is_empty() {
                continue;
            }
            if let Some(bad) = part
                .chars()
                .find(|c| !c.is_alphanumeric() && !PATTERN_CHARS.contains(*c))
            {
                return Err(IngestError::invalid_pattern(
                    &part,
                    format!("character '{bad}' is not allowed"),
                ));
            }
            if !patterns.contains(&part) {
                patterns.push(part);
            }
        }
    }
    Ok(patterns)
}

/// Compiled pattern set matching both full relative paths and bare names.
#[derive(Debug, Clone)]
struct Matcher {
    paths: GlobSet,
    names: GlobSet,
}

impl Matcher {
    fn build(patterns: &[String]) -> Result<Option<Self>, IngestError> {
        let mut paths = GlobSetBuilder::new();
        let mut names = GlobSetBuilder::new();
        let mut any = false;

        for raw in patterns {
            let pattern = normalize_pattern(raw);
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(false)
                .backslash_escape(true)
                .build()
                .map_err(|e| IngestError::invalid_pattern(raw, e.to_string()))?;
            if !pattern.contains('/') {
                names.add(glob.clone());
            }
            paths.add(glob);
            any = true;
        }

        if !any {
            return Ok(None);
        }

        let paths = paths
            .build()
            .map_err(|e| IngestError::invalid_pattern(patterns.join(","), e.to_string()))?;
        let names = names
            .build()
            .map_err(|e| IngestError::invalid_pattern(patterns.join(","), e.to_string()))?;
        Ok(Some(Self { paths, names }))
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        if self.paths.is_match(rel) {
            return true;
        }
        if is_dir && self.paths.is_match(format!("{rel}/")) {
            return true;
        }
        let name = rel.rsplit('/').next().unwrap_or(rel);
        self.names.is_match(name)
    }
}

/// Include/exclude filter evaluated against paths relative to a base.
#[derive(Debug, Clone)]
pub struct PathFilter {
    base: PathBuf,
    ignore: Option<Matcher>,
    include: Option<Matcher>,
}

impl PathFilter {
    /// Compile a filter for paths under `base`.
    pub fn new(
        base: impl Into<PathBuf>,
        ignore_patterns: &[String],
        include_patterns: &[String],
    ) -> Result<Self, IngestError> {
        Ok(Self {
            base: base.into(),
            ignore: Matcher::build(ignore_patterns)?,
            include: Matcher::build(include_patterns)?,
        })
    }

    /// Base path that relative paths are computed against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether an include set is active.
    pub fn has_include_patterns(&self) -> bool {
        self.include.is_some()
    }

    /// True if the path matches an ignore pattern, or is not under the base.
    pub fn should_exclude(&self, path: &Path, is_dir: bool) -> bool {
        let Some(rel) = self.relative(path) else {
            return true;
        };
        match &self.ignore {
            Some(ignore) => ignore.matches(&rel, is_dir),
            None => false,
        }
    }

    /// True if no include set is configured, or the path matches one of it.
    ///
    /// Directories are tested with a trailing `/`.
    pub fn should_include(&self, path: &Path, is_dir: bool) -> bool {
        let Some(include) = &self.include else {
            return true;
        };
        let Some(rel) = self.relative(path) else {
            return false;
        };
        if is_dir {
            include.paths.is_match(format!("{rel}/"))
        } else {
            include.matches(&rel, false)
        }
    }

    /// Exclusion first, then inclusion. An excluded path is never
    /// re-admitted by an include pattern.
    pub fn allows(&self, path: &Path, is_dir: bool) -> bool {
        !self.should_exclude(path, is_dir) && self.should_include(path, is_dir)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.base).ok().map(to_slash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_normalize_pattern() {
        assert_eq!(normalize_pattern("/src/*.rs"), "src/*.rs");
        assert_eq!(normalize_pattern("docs/"), "docs/*");
        assert_eq!(normalize_pattern("*.md"), "*.md");
        assert_eq!(normalize_pattern("a\\b"), "a/b");
    }

    #[test]
    fn test_parse_patterns_splits_and_dedups() {
        let parsed = parse_patterns(&patterns(&["*.rs, *.toml", "*.rs docs/"])).unwrap();
        assert_eq!(parsed, patterns(&["*.rs", "*.toml", "docs/"]));
    }

    #[test]
    fn test_parse_patterns_rejects_bad_chars() {
        assert!(parse_patterns(&patterns(&["src/[ab].rs"])).is_err());
        assert!(parse_patterns(&patterns(&["@scope/pkg+1"])).is_ok());
    }

    #[test]
    fn test_star_crosses_separators() {
        let filter = PathFilter::new("/repo", &patterns(&["*.log"]), &[]).unwrap();
        assert!(filter.should_exclude(Path::new("/repo/a/b/debug.log"), false));
        assert!(!filter.should_exclude(Path::new("/repo/a/b/debug.txt"), false));
    }

    #[test]
    fn test_bare_name_matches_any_depth() {
        let filter = PathFilter::new("/repo", &patterns(&["node_modules"]), &[]).unwrap();
        assert!(filter.should_exclude(Path::new("/repo/node_modules"), true));
        assert!(filter.should_exclude(Path::new("/repo/web/node_modules"), true));
        assert!(!filter.should_exclude(Path::new("/repo/web/modules"), true));
    }

    #[test]
    fn test_trailing_separator_pattern_excludes_directory() {
        let filter = PathFilter::new("/repo", &patterns(&["docs/"]), &[]).unwrap();
        assert!(filter.should_exclude(Path::new("/repo/docs"), true));
        assert!(filter.should_exclude(Path::new("/repo/docs/guide.md"), false));
        assert!(!filter.should_exclude(Path::new("/repo/docs.md"), false));
    }

    #[test]
    fn test_outside_base_is_excluded() {
        let filter = PathFilter::new("/repo", &[], &patterns(&["*"])).unwrap();
        assert!(filter.should_exclude(Path::new("/elsewhere/file.txt"), false));
        assert!(!filter.should_include(Path::new("/elsewhere/file.txt"), false));
    }

    #[test]
    fn test_empty_include_allows_everything() {
        let filter = PathFilter::new("/repo", &[], &[]).unwrap();
        assert!(!filter.has_include_patterns());
        assert!(filter.should_include(Path::new("/repo/any/thing.bin"), false));
    }

    #[test]
    fn test_include_matches() {
        let filter = PathFilter::new("/repo", &[], &patterns(&["*.py", "docs/"])).unwrap();
        assert!(filter.should_include(Path::new("/repo/src/app.py"), false));
        assert!(filter.should_include(Path::new("/repo/docs"), true));
        assert!(!filter.should_include(Path::new("/repo/src/app.rs"), false));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter =
            PathFilter::new("/repo", &patterns(&["secret.py"]), &patterns(&["*.py"])).unwrap();
        assert!(!filter.allows(Path::new("/repo/secret.py"), false));
        assert!(filter.allows(Path::new("/repo/public.py"), false));
    }

    #[test]
    fn test_double_star() {
        let filter = PathFilter::new("/repo", &patterns(&["src/**/gen/*"]), &[]).unwrap();
        assert!(filter.should_exclude(Path::new("/repo/src/a/b/gen/x.rs"), false));
        assert!(!filter.should_exclude(Path::new("/repo/lib/gen/x.rs"), false));
    }

    #[test]
    fn test_case_sensitive() {
        let filter = PathFilter::new("/repo", &patterns(&["*.MD"]), &[]).unwrap();
        assert!(!filter.should_exclude(Path::new("/repo/readme.md"), false));
        assert!(filter.should_exclude(Path::new("/repo/README.MD"), false));
    }
}
