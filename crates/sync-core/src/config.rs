//! Engine configuration
//!
//! Loaded from `<registry_root>/.artefacts/config.toml` or an explicit path:
//!
//! ```toml
//! registry_root = "."
//! state_dir = ".artefacts"
//! max_depletion_sweeps = 100
//! watch = true
//!
//! [[kinds]]
//! type = "table"
//! extension = ".table"
//!
//! [[kinds]]
//! type = "job"
//! extension = ".job"
//! startable = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default directory for persisted engine state, relative to the registry root
pub const DEFAULT_STATE_DIR: &str = ".artefacts";

/// Name of the configuration file inside the state directory
pub const CONFIG_FILE: &str = "config.toml";

/// A generic artefact kind handled by a JSON synchronizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindConfig {
    /// Artefact type (e.g. `table`)
    #[serde(rename = "type")]
    pub artefact_type: String,
    /// Definition file extension (e.g. `.table`)
    pub extension: String,
    /// Whether artefacts of this kind are moved to STARTED
    #[serde(default)]
    pub startable: bool,
}

impl KindConfig {
    pub fn new(artefact_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            artefact_type: artefact_type.into(),
            extension: extension.into(),
            startable: false,
        }
    }

    pub fn startable(mut self) -> Self {
        self.startable = true;
        self
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the content tree to reconcile
    #[serde(default = "default_registry_root")]
    pub registry_root: PathBuf,
    /// Directory holding definitions, artefacts and problems
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Upper bound on depletion sweeps per phase
    #[serde(default = "default_max_depletion_sweeps")]
    pub max_depletion_sweeps: usize,
    /// Track changes with a filesystem watcher instead of rescanning always
    #[serde(default)]
    pub watch: bool,
    /// Artefact kinds handled by the generic synchronizer, in registration order
    #[serde(default)]
    pub kinds: Vec<KindConfig>,
}

fn default_registry_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_max_depletion_sweeps() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_root: default_registry_root(),
            state_dir: default_state_dir(),
            max_depletion_sweeps: default_max_depletion_sweeps(),
            watch: false,
            kinds: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and resolve its relative paths against the
    /// directory the registry root is given relative to
    pub fn load(path: &Path, base: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded engine configuration");
        Ok(Self::parse(&content)?.resolve(base))
    }

    /// Make `registry_root` absolute against `base` and `state_dir` absolute
    /// against the registry root
    pub fn resolve(mut self, base: &Path) -> Self {
        if self.registry_root.is_relative() {
            self.registry_root = base.join(&self.registry_root);
        }
        if self.state_dir.is_relative() {
            self.state_dir = self.registry_root.join(&self.state_dir);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_depletion_sweeps == 0 {
            return Err(Error::Config {
                message: "max_depletion_sweeps must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for kind in &self.kinds {
            if kind.artefact_type.trim().is_empty() || kind.extension.trim().is_empty() {
                return Err(Error::Config {
                    message: "every kind needs a type and an extension".to_string(),
                });
            }
            if kind.artefact_type.contains(crate::artefact::KEY_SEPARATOR) {
                return Err(Error::Config {
                    message: format!("kind type '{}' must not contain ':'", kind.artefact_type),
                });
            }
            if !seen.insert(kind.artefact_type.as_str()) {
                return Err(Error::Config {
                    message: format!("kind '{}' is declared twice", kind.artefact_type),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_depletion_sweeps, 100);
        assert_eq!(config.state_dir, PathBuf::from(".artefacts"));
        assert!(!config.watch);
    }

    #[test]
    fn test_parse_kinds() {
        let config = EngineConfig::parse(
            r#"
watch = true

[[kinds]]
type = "table"
extension = ".table"

[[kinds]]
type = "job"
extension = ".job"
startable = true
"#,
        )
        .unwrap();

        assert!(config.watch);
        assert_eq!(
            config.kinds,
            vec![
                KindConfig::new("table", ".table"),
                KindConfig::new("job", ".job").startable(),
            ]
        );
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let result = EngineConfig::parse(
            r#"
[[kinds]]
type = "table"
extension = ".table"

[[kinds]]
type = "table"
extension = ".tbl"
"#,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_zero_sweeps_rejected() {
        let result = EngineConfig::parse("max_depletion_sweeps = 0");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let result = EngineConfig::parse("kinds = 3");
        assert!(matches!(result, Err(Error::TomlDe(_))));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = EngineConfig::default().resolve(Path::new("/srv/registry"));
        assert_eq!(config.registry_root, PathBuf::from("/srv/registry/."));
        assert_eq!(config.state_dir, PathBuf::from("/srv/registry/./.artefacts"));
    }
}
