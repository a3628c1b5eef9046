//! Configurable JSON synchronizer
//!
//! Handles any artefact kind declared in the engine configuration. A
//! definition is a JSON object; two fields are understood by the engine:
//!
//! ```json
//! {
//!   "name": "totals",
//!   "dependencies": ["table:/shop/orders.table:orders"]
//! }
//! ```
//!
//! `name` defaults to the file stem. The whole object is kept as the
//! artefact payload.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use sync_fs::NormalizedPath;

use super::{ArtefactService, DependencyState, ParseError, PhaseOutcome, Synchronizer};
use crate::Result;
use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase};
use crate::config::KindConfig;
use crate::store::RecordStore;

/// Synchronizer for a `{type, extension}` kind with JSON definitions
pub struct GenericSynchronizer {
    artefact_type: String,
    extension: String,
    startable: bool,
    service: Arc<dyn ArtefactService>,
}

impl GenericSynchronizer {
    pub fn new(
        artefact_type: impl Into<String>,
        extension: impl Into<String>,
        service: Arc<dyn ArtefactService>,
    ) -> Self {
        let extension = extension.into();
        let extension = if extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            artefact_type: artefact_type.into(),
            extension,
            startable: false,
            service,
        }
    }

    /// Build a synchronizer for a configured kind
    ///
    /// With a `state_dir` the artefacts are persisted to
    /// `<state_dir>/artefacts-<type>.json`, otherwise they live in memory.
    pub fn from_kind(kind: &KindConfig, state_dir: Option<&Path>) -> Result<Self> {
        let service: Arc<dyn ArtefactService> = match state_dir {
            Some(dir) => {
                let path = NormalizedPath::new(dir.join(format!("artefacts-{}.json", kind.artefact_type)));
                Arc::new(RecordStore::<Artefact>::open(path)?)
            }
            None => Arc::new(RecordStore::<Artefact>::in_memory()),
        };
        let mut synchronizer = Self::new(&kind.artefact_type, &kind.extension, service);
        synchronizer.startable = kind.startable;
        Ok(synchronizer)
    }

    /// Move deployed artefacts to STARTED in the START phase
    pub fn with_startable(mut self, startable: bool) -> Self {
        self.startable = startable;
        self
    }

    pub fn is_startable(&self) -> bool {
        self.startable
    }

    /// Check that every declared dependency satisfies `ready`
    ///
    /// Returns `None` when the artefact may proceed, or the outcome to report.
    fn await_dependencies(
        &self,
        artefact: &mut Artefact,
        dependencies: &[DependencyState],
        ready: impl Fn(&DependencyState) -> bool,
    ) -> Option<PhaseOutcome> {
        for key in &artefact.dependencies {
            if *key == artefact.key {
                return Some(PhaseOutcome::Fatal(format!("Artefact depends on itself: {key}")));
            }
            let Some(state) = dependencies.iter().find(|d| d.key == *key) else {
                return Some(PhaseOutcome::Failed(format!("Unresolved dependency: {key}")));
            };
            if !ready(state) {
                let reason = format!("Waiting for dependency: {key} ({})", state.lifecycle);
                artefact.error = Some(reason);
                return Some(PhaseOutcome::Pending);
            }
        }
        None
    }

    fn transition(&self, artefact: &mut Artefact, lifecycle: ArtefactLifecycle) -> PhaseOutcome {
        match self.set_status(artefact, lifecycle, None) {
            Ok(()) => {
                tracing::debug!(key = %artefact.key, %lifecycle, "Artefact transitioned");
                PhaseOutcome::Completed
            }
            Err(e) => PhaseOutcome::Failed(e.to_string()),
        }
    }
}

impl Synchronizer for GenericSynchronizer {
    fn artefact_type(&self) -> &str {
        &self.artefact_type
    }

    fn file_extension(&self) -> &str {
        &self.extension
    }

    fn parse(&self, location: &str, content: &[u8]) -> std::result::Result<Vec<Artefact>, ParseError> {
        let value: Value =
            serde_json::from_slice(content).map_err(|e| ParseError::new(location, e.to_string()))?;
        let Value::Object(object) = &value else {
            return Err(ParseError::new(location, "definition must be a JSON object"));
        };

        let name = match object.get("name") {
            None => Path::new(location)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(_) => return Err(ParseError::new(location, "'name' must be a non-empty string")),
        };

        let dependencies = match object.get("dependencies") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ParseError::new(location, "'dependencies' must hold artefact keys"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(_) => return Err(ParseError::new(location, "'dependencies' must be an array")),
        };

        let artefact = Artefact::new(&self.artefact_type, location, name)
            .with_dependencies(dependencies)
            .with_payload(value);
        Ok(vec![artefact])
    }

    fn complete(
        &self,
        artefact: &mut Artefact,
        dependencies: &[DependencyState],
        phase: ArtefactPhase,
    ) -> PhaseOutcome {
        match phase {
            ArtefactPhase::Prepare => PhaseOutcome::Completed,
            ArtefactPhase::Create => {
                if artefact.phase != ArtefactPhase::Create || artefact.lifecycle.is_deployed() {
                    return PhaseOutcome::Completed;
                }
                if let Some(outcome) = self.await_dependencies(artefact, dependencies, |d| d.lifecycle.is_deployed()) {
                    return outcome;
                }
                self.transition(artefact, ArtefactLifecycle::Created)
            }
            ArtefactPhase::Update => {
                if artefact.phase != ArtefactPhase::Update
                    || matches!(
                        artefact.lifecycle,
                        ArtefactLifecycle::Updated | ArtefactLifecycle::Started
                    )
                {
                    return PhaseOutcome::Completed;
                }
                if let Some(outcome) = self.await_dependencies(artefact, dependencies, |d| d.lifecycle.is_deployed()) {
                    return outcome;
                }
                self.transition(artefact, ArtefactLifecycle::Updated)
            }
            ArtefactPhase::Start => {
                if !self.startable || (artefact.lifecycle == ArtefactLifecycle::Started && artefact.running) {
                    return PhaseOutcome::Completed;
                }
                if !artefact.lifecycle.is_deployed() {
                    artefact.error = Some(format!("Cannot start artefact in lifecycle {}", artefact.lifecycle));
                    return PhaseOutcome::Pending;
                }
                // Dependencies of this kind are startable too and must run first
                let own_type = self.artefact_type.as_str();
                let ready = |d: &DependencyState| {
                    if d.artefact_type == own_type {
                        d.lifecycle == ArtefactLifecycle::Started
                    } else {
                        d.lifecycle.is_deployed()
                    }
                };
                if let Some(outcome) = self.await_dependencies(artefact, dependencies, ready) {
                    return outcome;
                }
                artefact.running = true;
                self.transition(artefact, ArtefactLifecycle::Started)
            }
        }
    }

    fn cleanup(&self, artefact: &Artefact) -> Result<()> {
        self.service.delete(&artefact.key)?;
        tracing::debug!(key = %artefact.key, "Artefact removed");
        Ok(())
    }

    fn service(&self) -> &dyn ArtefactService {
        self.service.as_ref()
    }
}
