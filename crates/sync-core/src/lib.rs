//! Artefact synchronization engine
//!
//! This crate reconciles a content tree of definition files with the
//! artefacts they declare:
//!
//! - **Change scanning**: walk the registry root, checksum every accepted
//!   file and classify it against the persisted [`Definition`] records
//! - **Parser dispatch**: hand new and modified definitions to the owning
//!   [`Synchronizer`], retrieve unchanged ones
//! - **Topology**: order artefacts by their dependencies across all types
//! - **Depletion**: drive every artefact through the PREPARE, CREATE,
//!   UPDATE and START phases until no further progress is possible
//! - **Cleanup and reporting**: remove artefacts whose source vanished and
//!   record problems for the ones that never completed
//!
//! # Architecture
//!
//! ```text
//!                 SynchronizationProcessor
//!                          |
//!     +-----------+--------+---------+-------------+
//!     |           |                  |             |
//! ChangeScanner  SynchronizerRegistry  Topology   ProblemSink / HealthSink
//!     |           |                  |
//! DefinitionStore Synchronizer     TopologicalSorter / TopologicalDepleter
//!     |
//!  sync-fs
//! ```

pub mod artefact;
pub mod config;
pub mod definition;
pub mod error;
pub mod health;
pub mod problems;
pub mod processor;
pub mod scanner;
pub mod store;
pub mod synchronizer;
pub mod topology;
pub mod watcher;

pub use artefact::{Artefact, ArtefactLifecycle, ArtefactPhase};
pub use config::{EngineConfig, KindConfig};
pub use definition::{Definition, DefinitionState, DefinitionStore};
pub use error::{Error, Result};
pub use health::{HealthRegistry, HealthSink, JobStatus};
pub use problems::{Problem, ProblemSink, ProblemStore};
pub use processor::{RunOutcome, RunState, SkipReason, SyncReport, SynchronizationProcessor};
pub use scanner::{ChangeScanner, ScanResult};
pub use store::{Record, RecordStore};
pub use synchronizer::{
    ArtefactService, DependencyState, GenericSynchronizer, ParseError, PhaseOutcome,
    Synchronizer, SynchronizerRegistry,
};
pub use topology::{
    CycleError, Depletion, SortOutcome, TopologicalDepleter, TopologicalSorter,
    TopologicallySortable, Topology, TopologyWrapper,
};
pub use watcher::{SynchronizationWatcher, WatchMode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_path() {
        let error = Error::Store {
            path: "/var/registry/.artefacts/definitions.json".into(),
            message: "unexpected end of file".to_string(),
        };

        let display = format!("{}", error);
        assert!(
            display.contains("definitions.json"),
            "Error display should contain the path, got: {}",
            display
        );
    }
}
