//! Command implementations for sync-cli

pub mod run;
pub mod status;
pub mod watch;

pub use run::run_once;
pub use status::run_status;
pub use watch::run_watch;

use sync_core::{EngineConfig, SynchronizationProcessor};

/// Build a prepared processor for `config`
pub(crate) fn prepared_processor(config: &EngineConfig) -> crate::error::Result<SynchronizationProcessor> {
    if config.kinds.is_empty() {
        tracing::warn!("No artefact kinds configured, nothing will be synchronized");
    }
    let processor = SynchronizationProcessor::from_config(config)?;
    processor.prepare_synchronizers()?;
    Ok(processor)
}
