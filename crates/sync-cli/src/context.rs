//! Engine context resolution
//!
//! Locates the registry root and the engine configuration from the global
//! command-line options.

use std::path::{Path, PathBuf};

use sync_core::EngineConfig;
use sync_core::config::{CONFIG_FILE, DEFAULT_STATE_DIR};

use crate::error::{CliError, Result};

/// Where the engine runs and how it is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineContext {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl EngineContext {
    /// Resolve the context from optional `--root` and `--config` values
    ///
    /// The root defaults to `cwd`, the configuration to
    /// `<root>/.artefacts/config.toml`.
    pub fn resolve(cwd: &Path, root: Option<&Path>, config: Option<&Path>) -> Self {
        let root = match root {
            Some(root) if root.is_relative() => cwd.join(root),
            Some(root) => root.to_path_buf(),
            None => cwd.to_path_buf(),
        };
        let config_path = match config {
            Some(config) if config.is_relative() => cwd.join(config),
            Some(config) => config.to_path_buf(),
            None => root.join(DEFAULT_STATE_DIR).join(CONFIG_FILE),
        };
        Self { root, config_path }
    }

    /// Load the engine configuration, resolving its paths against the root
    pub fn load_config(&self) -> Result<EngineConfig> {
        if !self.config_path.exists() {
            return Err(CliError::user(format!(
                "No engine configuration found at {}",
                self.config_path.display()
            )));
        }
        Ok(EngineConfig::load(&self.config_path, &self.root)?)
    }
}
