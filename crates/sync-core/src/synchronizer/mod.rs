//! Synchronizer contract
//!
//! A [`Synchronizer`] owns one artefact type: it recognizes its definition
//! files, parses them into artefacts, executes lifecycle phases on them and
//! cleans them up once their source disappears. Synchronizers are
//! registered with a [`SynchronizerRegistry`]; registration order decides
//! which synchronizer owns a file and in which order phases run.

mod generic;
mod registry;

pub use generic::GenericSynchronizer;
pub use registry::SynchronizerRegistry;

use std::path::Path;

use crate::Result;
use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase};

/// A definition's content was rejected by its synchronizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse {location}: {message}")]
pub struct ParseError {
    pub location: String,
    pub message: String,
}

impl ParseError {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Result of asking a synchronizer to complete one phase for one artefact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The phase is done for this artefact
    Completed,
    /// The phase cannot run yet, try again on a later sweep
    Pending,
    /// The phase failed; the artefact stays pending and carries the reason
    Failed(String),
    /// The artefact can never complete; it is not retried
    Fatal(String),
}

/// Snapshot of a resolved dependency handed to [`Synchronizer::complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyState {
    pub key: String,
    pub artefact_type: String,
    pub lifecycle: ArtefactLifecycle,
}

impl DependencyState {
    pub fn of(artefact: &Artefact) -> Self {
        Self {
            key: artefact.key.clone(),
            artefact_type: artefact.artefact_type.clone(),
            lifecycle: artefact.lifecycle,
        }
    }
}

/// Persistence of the artefacts owned by one synchronizer
pub trait ArtefactService: Send + Sync {
    fn get_all(&self) -> Result<Vec<Artefact>>;

    fn find_by_key(&self, key: &str) -> Result<Option<Artefact>>;

    /// All artefacts parsed from the definition at `location`
    fn find_by_location(&self, location: &str) -> Result<Vec<Artefact>>;

    fn save(&self, artefact: &Artefact) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Pluggable capability for one artefact type
pub trait Synchronizer: Send + Sync {
    /// Artefact type handled by this synchronizer (e.g. `table`)
    fn artefact_type(&self) -> &str;

    /// Extension of the definition files, including the dot (e.g. `.table`)
    fn file_extension(&self) -> &str;

    /// Job name reported to the health sink
    fn name(&self) -> String {
        format!("{}-synchronizer", self.artefact_type())
    }

    /// Whether the file at `path` is a definition of this synchronizer
    fn is_accepted(&self, path: &Path) -> bool {
        path.to_string_lossy().ends_with(self.file_extension())
    }

    /// Whether artefacts of `artefact_type` belong to this synchronizer
    fn is_accepted_type(&self, artefact_type: &str) -> bool {
        self.artefact_type() == artefact_type
    }

    /// Parse the content of a new or modified definition
    fn parse(&self, location: &str, content: &[u8]) -> std::result::Result<Vec<Artefact>, ParseError>;

    /// Load the persisted artefacts of an unchanged definition
    fn retrieve(&self, location: &str) -> Result<Vec<Artefact>> {
        self.service().find_by_location(location)
    }

    /// Record a lifecycle change and persist the artefact
    fn set_status(
        &self,
        artefact: &mut Artefact,
        lifecycle: ArtefactLifecycle,
        error: Option<&str>,
    ) -> Result<()> {
        artefact.lifecycle = lifecycle;
        artefact.error = error.filter(|e| !e.is_empty()).map(str::to_string);
        self.service().save(artefact)
    }

    /// Execute `phase` for `artefact`
    ///
    /// `dependencies` holds the current state of every dependency that was
    /// resolved in this run's topology. Must be fast and idempotent: it is
    /// called again on every sweep until it reports progress.
    fn complete(
        &self,
        artefact: &mut Artefact,
        dependencies: &[DependencyState],
        phase: ArtefactPhase,
    ) -> PhaseOutcome;

    /// Remove an artefact whose definition no longer exists
    fn cleanup(&self, artefact: &Artefact) -> Result<()>;

    /// Persistence of this synchronizer's artefacts
    fn service(&self) -> &dyn ArtefactService;
}

impl ArtefactService for crate::store::RecordStore<Artefact> {
    fn get_all(&self) -> Result<Vec<Artefact>> {
        Ok(self.all())
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Artefact>> {
        Ok(self.get(key))
    }

    fn find_by_location(&self, location: &str) -> Result<Vec<Artefact>> {
        Ok(self.find(|artefact| artefact.location == location))
    }

    fn save(&self, artefact: &Artefact) -> Result<()> {
        self.upsert(artefact.clone())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.remove(key).map(|_| ())
    }
}
