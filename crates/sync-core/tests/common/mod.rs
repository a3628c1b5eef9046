//! Shared fixtures for the processor integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use sync_core::{
    Artefact, ArtefactPhase, ArtefactService, Definition, DefinitionStore, DependencyState,
    GenericSynchronizer, HealthRegistry, ParseError, PhaseOutcome, ProblemStore, RecordStore,
    SyncReport, SynchronizationProcessor, Synchronizer, SynchronizerRegistry,
};
use sync_test_utils::registry::TestRegistry;

/// Blocks the first `complete` call until released
pub struct Gate {
    entered: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
}

impl Gate {
    pub fn new(entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            entered: Mutex::new(Some(entered)),
            release: Mutex::new(Some(release)),
        }
    }

    fn wait(&self) {
        let Some(entered) = self.entered.lock().take() else {
            return;
        };
        let _ = entered.send(());
        if let Some(release) = self.release.lock().take() {
            let _ = release.recv();
        }
    }
}

/// Generic JSON synchronizer that records every call made by the engine
pub struct RecordingSynchronizer {
    inner: GenericSynchronizer,
    parses: Mutex<Vec<String>>,
    completions: Mutex<Vec<(ArtefactPhase, String)>>,
    cleanups: Mutex<Vec<String>>,
    gate: Option<Gate>,
    panic_on: Option<String>,
}

impl RecordingSynchronizer {
    pub fn new(artefact_type: &str, extension: &str) -> Self {
        Self {
            inner: GenericSynchronizer::new(artefact_type, extension, Arc::new(RecordStore::in_memory())),
            parses: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
            gate: None,
            panic_on: None,
        }
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Panic when parsing the definition at `location`
    pub fn panicking_on(mut self, location: &str) -> Self {
        self.panic_on = Some(location.to_string());
        self
    }

    /// Locations parsed so far
    pub fn parses(&self) -> Vec<String> {
        self.parses.lock().clone()
    }

    /// Keys that completed `phase`, in completion order
    pub fn completed(&self, phase: ArtefactPhase) -> Vec<String> {
        self.completions
            .lock()
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Keys passed to cleanup
    pub fn cleanups(&self) -> Vec<String> {
        self.cleanups.lock().clone()
    }

    pub fn stored(&self, key: &str) -> Option<Artefact> {
        self.inner.service().find_by_key(key).unwrap()
    }
}

impl Synchronizer for RecordingSynchronizer {
    fn artefact_type(&self) -> &str {
        self.inner.artefact_type()
    }

    fn file_extension(&self) -> &str {
        self.inner.file_extension()
    }

    fn parse(&self, location: &str, content: &[u8]) -> Result<Vec<Artefact>, ParseError> {
        if self.panic_on.as_deref() == Some(location) {
            panic!("parser exploded on {location}");
        }
        self.parses.lock().push(location.to_string());
        self.inner.parse(location, content)
    }

    fn complete(
        &self,
        artefact: &mut Artefact,
        dependencies: &[DependencyState],
        phase: ArtefactPhase,
    ) -> PhaseOutcome {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        let outcome = self.inner.complete(artefact, dependencies, phase);
        if outcome == PhaseOutcome::Completed {
            self.completions.lock().push((phase, artefact.key.clone()));
        }
        outcome
    }

    fn cleanup(&self, artefact: &Artefact) -> sync_core::Result<()> {
        self.cleanups.lock().push(artefact.key.clone());
        self.inner.cleanup(artefact)
    }

    fn service(&self) -> &dyn ArtefactService {
        self.inner.service()
    }
}

/// A processor over a temporary registry with observable collaborators
pub struct Engine {
    pub registry: TestRegistry,
    pub processor: SynchronizationProcessor,
    pub synchronizers: Vec<Arc<RecordingSynchronizer>>,
    pub definitions: Arc<RecordStore<Definition>>,
    pub problems: Arc<ProblemStore>,
    pub health: Arc<HealthRegistry>,
}

impl Engine {
    /// Engine with one recording synchronizer per `(type, extension)`, in order
    pub fn new(kinds: &[(&str, &str)]) -> Self {
        let synchronizers = kinds
            .iter()
            .map(|(artefact_type, extension)| RecordingSynchronizer::new(artefact_type, extension))
            .collect();
        Self::with_synchronizers(synchronizers)
    }

    pub fn with_synchronizers(synchronizers: Vec<RecordingSynchronizer>) -> Self {
        let registry = TestRegistry::new();
        let synchronizers: Vec<Arc<RecordingSynchronizer>> =
            synchronizers.into_iter().map(Arc::new).collect();

        let mut sync_registry = SynchronizerRegistry::new();
        for synchronizer in &synchronizers {
            sync_registry.register(Arc::clone(synchronizer) as Arc<dyn Synchronizer>);
        }

        let definitions = Arc::new(RecordStore::<Definition>::in_memory());
        let problems = Arc::new(ProblemStore::in_memory());
        let health = Arc::new(HealthRegistry::new());
        let processor = SynchronizationProcessor::new(
            registry.root(),
            sync_registry,
            Arc::clone(&definitions) as Arc<dyn DefinitionStore>,
        )
        .with_problems(problems.clone())
        .with_health(health.clone());
        processor.prepare_synchronizers().unwrap();

        Self {
            registry,
            processor,
            synchronizers,
            definitions,
            problems,
            health,
        }
    }

    pub fn synchronizer(&self, artefact_type: &str) -> &RecordingSynchronizer {
        self.synchronizers
            .iter()
            .find(|s| s.artefact_type() == artefact_type)
            .unwrap()
    }

    /// Run once and expect a completed run
    pub fn run(&self) -> SyncReport {
        self.processor
            .process_synchronizers()
            .unwrap()
            .report()
            .cloned()
            .expect("run should not be skipped")
    }

    pub fn definition(&self, location: &str) -> Definition {
        self.definitions.find_by_key(location).unwrap().unwrap()
    }
}
