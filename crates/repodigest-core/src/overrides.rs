//! Per-root override file (`.repodigest`).
//!
//! ```toml
//! [config]
//! ignore_patterns = ["*.snap", "fixtures/"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::filter::parse_patterns;

/// File name looked up at the scan root.
pub const OVERRIDE_FILE_NAME: &str = ".repodigest";

/// Parsed override file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideFile {
    /// The recognized section.
    #[serde(default)]
    pub config: OverrideSection,
}

/// `[config]` section. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideSection {
    /// Extra patterns appended to the ignore set.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

impl OverrideFile {
    /// Parse override file text.
    pub fn parse(path: &Path, text: &str) -> Result<Self, IngestError> {
        toml::from_str(text).map_err(|e| IngestError::OverrideFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the override file under `root`, if there is one.
    pub fn load(root: &Path) -> Result<Option<Self>, IngestError> {
        let path = override_path(root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IngestError::OverrideFile {
                    path,
                    message: e.to_string(),
                });
            }
        };
        Self::parse(&path, &text).map(Some)
    }
}

/// Location of the override file for a scan root.
pub fn override_path(root: &Path) -> PathBuf {
    root.join(OVERRIDE_FILE_NAME)
}

impl IngestConfig {
    /// Merge the override file found at `root` into this config.
    ///
    /// A missing file is a no-op; a malformed one is a hard error.
    pub fn apply_override_file(&mut self, root: &Path) -> Result<(), IngestError> {
        let Some(file) = OverrideFile::load(root)? else {
            return Ok(());
        };

        let extra = parse_patterns(&file.config.ignore_patterns)?;
        debug!(
            "Applying {} ignore pattern(s) from {}",
            extra.len(),
            override_path(root).display()
        );
        for pattern in extra {
            if !self.ignore_patterns.contains(&pattern) {
                self.ignore_patterns.push(pattern);
            }
        }
        Ok(())
    }
}
