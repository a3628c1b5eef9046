//! Error types for sync-core

use std::path::PathBuf;

/// Result type for sync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync-core operations
///
/// Only infrastructure failures surface as `Error` from a synchronization
/// run. Problems with a single definition or artefact are recorded in the
/// run report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persisted record file could not be read or decoded
    #[error("Store error at {path}: {message}")]
    Store { path: PathBuf, message: String },

    /// Artefact not found in its service
    #[error("Artefact not found: {key}")]
    ArtefactNotFound { key: String },

    /// A synchronizer failed outside of a lifecycle phase
    #[error("Synchronizer error for {artefact_type}: {message}")]
    Synchronizer {
        artefact_type: String,
        message: String,
    },

    /// Invalid engine configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// The change watcher could not be started
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from sync-fs
    #[error(transparent)]
    Fs(#[from] sync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    /// Create a synchronizer error for the given artefact type
    pub fn synchronizer(artefact_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Synchronizer {
            artefact_type: artefact_type.into(),
            message: message.into(),
        }
    }
}
