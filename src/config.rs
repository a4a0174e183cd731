use std::path::Path;

use toml_edit::DocumentMut;

use crate::error::Error;
use crate::rewrite::MarkerPolicy;

/// Table under `[package.metadata]` holding per-project settings.
pub const METADATA_KEY: &str = "method-logger";

const KEEP_MARKER: &str = "keep-marker";

/// Per-project settings, read from the project's `Cargo.toml`:
///
/// ```toml
/// [package.metadata.method-logger]
/// keep-marker = true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    pub marker_policy: MarkerPolicy,
}

impl Config {
    /// Load settings for the project rooted at `project_root`.
    ///
    /// A missing manifest or a manifest without the metadata table yields the
    /// defaults.
    pub fn load(project_root: &Path) -> Result<Self, Error> {
        let manifest = project_root.join("Cargo.toml");
        let content = match std::fs::read_to_string(&manifest) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(Error::ReadError {
                    path: manifest,
                    source,
                });
            }
        };
        Self::from_manifest_str(&content, &manifest)
    }

    /// Load settings from the nearest `Cargo.toml` at or above `start`, which
    /// may be a file or a directory.
    pub fn discover(start: &Path) -> Result<Self, Error> {
        let start = std::fs::canonicalize(start)?;
        let first_dir = if start.is_file() {
            start.parent()
        } else {
            Some(start.as_path())
        };
        for dir in first_dir.into_iter().flat_map(Path::ancestors) {
            if dir.join("Cargo.toml").is_file() {
                return Self::load(dir);
            }
        }
        Ok(Self::default())
    }

    /// Parse settings out of manifest text. `path` is only used in errors.
    pub fn from_manifest_str(content: &str, path: &Path) -> Result<Self, Error> {
        let doc: DocumentMut = content.parse().map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            reason: format!("{e}"),
        })?;
        let Some(table) = doc
            .get("package")
            .and_then(|p| p.get("metadata"))
            .and_then(|m| m.get(METADATA_KEY))
        else {
            return Ok(Self::default());
        };

        if let Some(keys) = table.as_table_like() {
            for (key, _) in keys.iter() {
                if key != KEEP_MARKER {
                    tracing::warn!(key, manifest = %path.display(), "unknown method-logger setting");
                }
            }
        }

        let mut config = Self::default();
        if let Some(value) = table.get(KEEP_MARKER) {
            let keep = value.as_bool().ok_or_else(|| Error::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("`{KEEP_MARKER}` must be a boolean"),
            })?;
            config.marker_policy = if keep {
                MarkerPolicy::Retain
            } else {
                MarkerPolicy::Strip
            };
        }
        Ok(config)
    }

    /// Apply the `--keep-marker` flag on top of the manifest settings.
    pub fn with_keep_marker(mut self, keep_marker: bool) -> Self {
        if keep_marker {
            self.marker_policy = MarkerPolicy::Retain;
        }
        self
    }
}
