//! Disk configuration.
//!
//! Disks are declared in a TOML file, one table per disk id:
//!
//! ```toml
//! [disks.media]
//! label = "Media"
//! source = "~/media"
//!
//! [disks.docs]
//! label = "Documents"
//! source = "shared/docs"
//! ```
//!
//! Table order is registration order. `source` gets `~` expansion, and a
//! relative source is taken relative to the directory holding the file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::vfs::DiskRegistry;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("disk \"{id}\": `{field}` must not be empty")]
    EmptyField { id: String, field: &'static str },
}

/// One configured disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskConfig {
    pub label: String,
    pub source: String,
}

impl DiskConfig {
    /// Absolute root for this disk.
    pub fn root(&self, base_dir: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&self.source).as_ref());
        if expanded.is_absolute() {
            expanded
        } else {
            base_dir.join(expanded)
        }
    }
}

/// The full set of configured disks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisksConfig {
    #[serde(default)]
    pub disks: IndexMap<String, DiskConfig>,

    /// Directory relative sources are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl DisksConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = Self::parse(&text, path.display().to_string(), base_dir)?;
        tracing::debug!(path = %path.display(), disks = config.disks.len(), "loaded disk config");
        Ok(config)
    }

    /// Parse TOML text; relative sources resolve against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::parse(text, "<string>".to_string(), base_dir.into())
    }

    fn parse(text: &str, origin: String, base_dir: PathBuf) -> Result<Self, ConfigError> {
        let mut config: DisksConfig =
            toml::from_str(text).map_err(|source| ConfigError::Parse { origin, source })?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (id, disk) in &self.disks {
            if disk.label.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    id: id.clone(),
                    field: "label",
                });
            }
            if disk.source.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    id: id.clone(),
                    field: "source",
                });
            }
        }
        Ok(())
    }
}

impl DiskRegistry {
    /// Register every configured disk, in file order.
    pub fn from_config(config: &DisksConfig) -> Self {
        let mut registry = DiskRegistry::new();
        for (id, disk) in &config.disks {
            registry.create(id.clone(), disk.label.clone(), disk.root(&config.base_dir));
        }
        registry
    }
}
