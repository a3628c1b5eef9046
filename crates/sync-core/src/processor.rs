//! Synchronization processor
//!
//! Orchestrates one reconciliation run:
//!
//! 1. Scan the registry into per-synchronizer definition queues
//! 2. Mark definitions whose files vanished as DELETED
//! 3. Dispatch definitions: parse new and modified ones, retrieve parsed ones
//! 4. If anything is new or modified (or on the first run): sort all
//!    artefacts, deplete PREPARE dependents first, then CREATE, UPDATE and
//!    START dependencies first, per synchronizer in registration order
//! 5. Retry leftovers across all synchronizers until no further progress
//! 6. Register what is still undepleted as FAILED with a problem record
//! 7. Clean up artefacts whose source file is gone
//!
//! Only one run is in flight at a time; concurrent triggers are skipped.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use sync_fs::NormalizedPath;

use crate::Result;
use crate::artefact::{Artefact, ArtefactLifecycle, ArtefactPhase};
use crate::config::EngineConfig;
use crate::definition::{Definition, DefinitionState, DefinitionStore};
use crate::health::{HealthRegistry, HealthSink, JobStatus};
use crate::problems::{ProblemSink, ProblemStore};
use crate::scanner::{ChangeScanner, ScanResult};
use crate::store::RecordStore;
use crate::synchronizer::{GenericSynchronizer, Synchronizer, SynchronizerRegistry};
use crate::topology::{Depletion, TopologicalDepleter, Topology, TopologyWrapper};
use crate::watcher::{SynchronizationWatcher, WatchMode};

/// Definition store file inside the state directory
pub const DEFINITIONS_FILE: &str = "definitions.json";

/// Problem store file inside the state directory
pub const PROBLEMS_FILE: &str = "problems.json";

/// What the processor is currently doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Preparing,
    Running,
}

/// Why a run request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Another run or preparation is in flight
    InProgress,
    /// [`SynchronizationProcessor::prepare_synchronizers`] was never called
    NotPrepared,
    /// Nothing changed since the last completed run
    Unchanged,
}

/// Result of a run request
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Artefacts parsed from new definitions
    pub new: usize,
    /// Artefacts parsed from modified definitions
    pub modified: usize,
    /// Artefacts that ended the run CREATED
    pub created: usize,
    /// Artefacts that ended the run UPDATED
    pub updated: usize,
    /// Artefacts that ended the run STARTED
    pub started: usize,
    /// Artefacts registered as FAILED
    pub failed: usize,
    /// Artefacts known to this run
    pub total: usize,
    /// Whether the phases were executed
    pub processed: bool,
    /// Cross-synchronizer retry rounds
    pub cross_rounds: usize,
    /// Keys of artefacts that never completed their phases
    pub undepleted: Vec<String>,
    /// Keys of artefacts that reported a fatal outcome
    pub fatal: Vec<String>,
    /// Dependency cycles, as sorted member keys
    pub cycles: Vec<Vec<String>>,
    /// Keys of artefacts removed because their source vanished
    pub cleaned_up: Vec<String>,
    /// Locations of definitions that failed to parse
    pub broken: Vec<String>,
    /// Locations of definitions marked deleted
    pub deleted: Vec<String>,
    /// Every error recorded during the run
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    run: RunState,
    prepared: bool,
    initialized: bool,
}

/// Restores the engine state when a run ends, including by panic
struct RunGuard<'a> {
    processor: &'a SynchronizationProcessor,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.processor.watcher.reset();
        let mut state = self.processor.state.lock();
        state.initialized = true;
        state.run = RunState::Idle;
    }
}

/// Artefacts of a run keyed across all synchronizers
#[derive(Default)]
struct MergedArtefacts {
    entries: Vec<(usize, Artefact)>,
    positions: HashMap<String, usize>,
}

impl MergedArtefacts {
    /// Add an artefact; a key already owned by another synchronizer is
    /// rejected with an error message
    fn insert(&mut self, owner: usize, artefact: Artefact, registry: &SynchronizerRegistry) -> Option<String> {
        match self.positions.get(&artefact.key) {
            Some(&position) if self.entries[position].0 == owner => {
                self.entries[position].1 = artefact;
                None
            }
            Some(&position) => {
                let type_of = |owner: usize| {
                    registry
                        .get(owner)
                        .map(|s| s.artefact_type().to_string())
                        .unwrap_or_default()
                };
                Some(format!(
                    "Artefact key collision: [{}] is owned by [{}], ignored from [{}]",
                    artefact.key,
                    type_of(self.entries[position].0),
                    type_of(owner)
                ))
            }
            None => {
                self.positions.insert(artefact.key.clone(), self.entries.len());
                self.entries.push((owner, artefact));
                None
            }
        }
    }

    fn has_changes(&self) -> bool {
        self.entries.iter().any(|(_, artefact)| {
            matches!(artefact.lifecycle, ArtefactLifecycle::New | ArtefactLifecycle::Modified)
        })
    }
}

/// Undepleted and fatal nodes collected across phases
#[derive(Debug, Default)]
struct DepletionTracker {
    /// Undepleted nodes with the first phase they got stuck in
    pending: BTreeMap<usize, ArtefactPhase>,
    /// Fatal nodes with their phase and reason
    fatal: BTreeMap<usize, (ArtefactPhase, String)>,
}

impl DepletionTracker {
    fn record(&mut self, depletion: Depletion, phase: ArtefactPhase) {
        for index in depletion.undepleted {
            self.pending.entry(index).or_insert(phase);
        }
        for (index, reason) in depletion.fatal {
            self.pending.remove(&index);
            self.fatal.entry(index).or_insert((phase, reason));
        }
    }

    fn is_fatal(&self, index: usize) -> bool {
        self.fatal.contains_key(&index)
    }
}

/// Reconciles the registry with the artefacts its definitions declare
pub struct SynchronizationProcessor {
    root: PathBuf,
    registry: SynchronizerRegistry,
    definitions: Arc<dyn DefinitionStore>,
    problems: Arc<dyn ProblemSink>,
    health: Arc<dyn HealthSink>,
    watcher: SynchronizationWatcher,
    depleter: TopologicalDepleter,
    state: Mutex<EngineState>,
}

impl SynchronizationProcessor {
    /// Create a processor with in-memory problem and health sinks
    pub fn new(
        root: impl Into<PathBuf>,
        registry: SynchronizerRegistry,
        definitions: Arc<dyn DefinitionStore>,
    ) -> Self {
        Self {
            root: root.into(),
            registry,
            definitions,
            problems: Arc::new(ProblemStore::in_memory()),
            health: Arc::new(HealthRegistry::new()),
            watcher: SynchronizationWatcher::default(),
            depleter: TopologicalDepleter::default(),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Build a processor with generic synchronizers for every configured
    /// kind and file-backed stores under the state directory
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let state_dir = config.state_dir.as_path();

        let mut registry = SynchronizerRegistry::new();
        for kind in &config.kinds {
            registry.register(Arc::new(GenericSynchronizer::from_kind(kind, Some(state_dir))?));
        }
        let definitions = RecordStore::<Definition>::open(state_dir.join(DEFINITIONS_FILE))?;
        let problems = ProblemStore::open(state_dir.join(PROBLEMS_FILE))?;
        let mode = if config.watch {
            WatchMode::Watch
        } else {
            WatchMode::Always
        };

        Ok(Self::new(&config.registry_root, registry, Arc::new(definitions))
            .with_problems(Arc::new(problems))
            .with_watcher(SynchronizationWatcher::new(mode))
            .with_depleter(TopologicalDepleter::new(config.max_depletion_sweeps)))
    }

    pub fn with_problems(mut self, problems: Arc<dyn ProblemSink>) -> Self {
        self.problems = problems;
        self
    }

    pub fn with_health(mut self, health: Arc<dyn HealthSink>) -> Self {
        self.health = health;
        self
    }

    pub fn with_watcher(mut self, watcher: SynchronizationWatcher) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_depleter(mut self, depleter: TopologicalDepleter) -> Self {
        self.depleter = depleter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &SynchronizerRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> &dyn DefinitionStore {
        self.definitions.as_ref()
    }

    pub fn watcher(&self) -> &SynchronizationWatcher {
        &self.watcher
    }

    pub fn run_state(&self) -> RunState {
        self.state.lock().run
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    /// Whether at least one run completed
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Mark every persisted artefact as not running and start change
    /// detection on the registry root
    pub fn prepare_synchronizers(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.run != RunState::Idle {
                tracing::debug!(state = ?state.run, "Skipping preparation, engine busy");
                return Ok(());
            }
            state.run = RunState::Preparing;
        }

        let result = self.reset_running();
        let mut state = self.state.lock();
        state.run = RunState::Idle;
        if result.is_ok() {
            state.prepared = true;
            tracing::debug!(synchronizers = self.registry.len(), "Synchronizers prepared");
        }
        result
    }

    fn reset_running(&self) -> Result<()> {
        for (_, synchronizer) in self.registry.iter() {
            for mut artefact in synchronizer.service().get_all()? {
                if artefact.running {
                    artefact.running = false;
                    synchronizer.service().save(&artefact)?;
                }
            }
        }
        self.watcher.initialize(&self.root)
    }

    /// Run one reconciliation if the engine is prepared, idle and the
    /// registry changed since the last run
    ///
    /// # Errors
    ///
    /// Only infrastructure failures abort a run: an unreachable registry
    /// root or a definition store that cannot be read or written. Problems
    /// with single definitions or artefacts are recorded in the report.
    pub fn process_synchronizers(&self) -> Result<RunOutcome> {
        let first_run = {
            let mut state = self.state.lock();
            if state.run != RunState::Idle {
                tracing::debug!("Synchronization already in progress");
                return Ok(RunOutcome::Skipped(SkipReason::InProgress));
            }
            if !state.prepared {
                tracing::debug!("Synchronizers not prepared yet");
                return Ok(RunOutcome::Skipped(SkipReason::NotPrepared));
            }
            if state.initialized && !self.watcher.is_modified() {
                tracing::trace!("Registry unchanged, skipping synchronization");
                return Ok(RunOutcome::Skipped(SkipReason::Unchanged));
            }
            state.run = RunState::Running;
            !state.initialized
        };
        let _guard = RunGuard { processor: self };

        let started = Instant::now();
        tracing::debug!(first_run, "Processing synchronizers started");
        let report = self.run(first_run)?;

        tracing::debug!(
            new = report.new,
            modified = report.modified,
            created = report.created,
            updated = report.updated,
            started = report.started,
            failed = report.failed,
            total = report.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processing synchronizers done"
        );
        if !report.errors.is_empty() {
            tracing::error!(
                count = report.errors.len(),
                errors = %report.errors.join("\n"),
                "Synchronization finished with errors"
            );
        }
        Ok(RunOutcome::Completed(report))
    }

    fn run(&self, first_run: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let scanner = ChangeScanner::new(&self.root, &self.registry, self.definitions.as_ref());
        let ScanResult {
            queues,
            observed,
            errors,
            ..
        } = scanner.scan()?;
        report.errors.extend(errors);

        report.deleted = scanner
            .mark_deleted(&observed)?
            .into_iter()
            .map(|definition| definition.location)
            .collect();

        let mut merged = MergedArtefacts::default();
        for (owner, queue) in queues.into_iter().enumerate() {
            let Some(synchronizer) = self.registry.get(owner) else {
                continue;
            };
            for definition in queue {
                self.dispatch(owner, synchronizer.as_ref(), definition, &mut merged, &mut report)?;
            }
        }
        report.total = merged.entries.len();

        if first_run || merged.has_changes() {
            report.processed = true;
            self.process(merged.entries, &mut report);
        } else {
            tracing::debug!("No new or modified artefacts");
        }

        self.cleanup(&mut report);
        Ok(report)
    }

    /// Turn one definition into artefacts according to its state
    fn dispatch(
        &self,
        owner: usize,
        synchronizer: &dyn Synchronizer,
        mut definition: Definition,
        merged: &mut MergedArtefacts,
        report: &mut SyncReport,
    ) -> Result<()> {
        let location = definition.location.clone();
        let artefacts = match definition.state {
            DefinitionState::Broken => {
                tracing::trace!(%location, "Skipping broken definition");
                return Ok(());
            }
            DefinitionState::Parsed => match synchronizer.retrieve(&location) {
                Ok(artefacts) => artefacts,
                Err(e) => {
                    let message = format!("Failed to retrieve artefacts of {location}: {e}");
                    tracing::error!(%location, error = %e, "Failed to retrieve artefacts");
                    report.errors.push(message);
                    return Ok(());
                }
            },
            DefinitionState::New | DefinitionState::Modified | DefinitionState::Deleted => {
                let modified = definition.state == DefinitionState::Modified;
                let previous = if modified {
                    synchronizer.retrieve(&location).unwrap_or_else(|e| {
                        tracing::warn!(%location, error = %e, "Cannot load previous artefacts");
                        Vec::new()
                    })
                } else {
                    Vec::new()
                };

                match self.parse(synchronizer, &mut definition, modified) {
                    Ok(artefacts) => {
                        definition.transition(DefinitionState::Parsed, "");
                        self.definitions.save(&definition)?;
                        for artefact in &artefacts {
                            if modified {
                                report.modified += 1;
                                tracing::info!(key = %artefact.key, "Modified artefact");
                            } else {
                                report.new += 1;
                                tracing::info!(key = %artefact.key, "New artefact");
                            }
                        }
                        for stale in previous.iter().filter(|p| artefacts.iter().all(|a| a.key != p.key)) {
                            match synchronizer.cleanup(stale) {
                                Ok(()) => report.cleaned_up.push(stale.key.clone()),
                                Err(e) => report
                                    .errors
                                    .push(format!("Failed to clean up artefact {}: {e}", stale.key)),
                            }
                        }
                        artefacts
                    }
                    Err(message) => {
                        tracing::error!(%location, %message, "Broken definition");
                        definition.transition(DefinitionState::Broken, message);
                        self.definitions.save(&definition)?;
                        report.broken.push(location);
                        return Ok(());
                    }
                }
            }
        };

        for artefact in artefacts {
            if let Some(error) = merged.insert(owner, artefact, &self.registry) {
                tracing::error!(%error, "Artefact key collision");
                report.errors.push(error);
            }
        }
        Ok(())
    }

    /// Parse a new or modified definition and persist its artefacts
    ///
    /// Any failure, including a panicking synchronizer, is returned as the
    /// message the definition is marked broken with.
    fn parse(
        &self,
        synchronizer: &dyn Synchronizer,
        definition: &mut Definition,
        modified: bool,
    ) -> std::result::Result<Vec<Artefact>, String> {
        let Some(content) = definition.content.take() else {
            return Err(format!(
                "Content of {} has not been loaded correctly",
                definition.location
            ));
        };
        let location = definition.location.as_str();

        let parsed = panic::catch_unwind(AssertUnwindSafe(|| synchronizer.parse(location, &content)))
            .map_err(|_| {
                format!(
                    "Synchronizer for {} panicked while parsing {location}",
                    synchronizer.artefact_type()
                )
            })?;
        let mut artefacts = parsed.map_err(|e| e.to_string())?;

        let (phase, lifecycle) = if modified {
            (ArtefactPhase::Update, ArtefactLifecycle::Modified)
        } else {
            (ArtefactPhase::Create, ArtefactLifecycle::New)
        };
        for artefact in &mut artefacts {
            artefact.phase = phase;
            artefact.lifecycle = lifecycle;
            artefact.error = None;
            artefact.running = false;
            synchronizer
                .service()
                .save(artefact)
                .map_err(|e| format!("Failed to save artefact {}: {e}", artefact.key))?;
        }
        Ok(artefacts)
    }

    /// Sort and deplete every phase, then retry leftovers across synchronizers
    fn process(&self, entries: Vec<(usize, Artefact)>, report: &mut SyncReport) {
        let mut topology = Topology::build(entries, &self.registry);
        let initial: Vec<ArtefactLifecycle> = topology
            .nodes()
            .iter()
            .map(|node| node.artefact.lifecycle)
            .collect();

        let sorted = topology.sort();
        report.cycles = sorted.cycles.into_iter().map(|cycle| cycle.members).collect();
        let order = sorted.order;
        let reversed: Vec<usize> = order.iter().rev().copied().collect();

        for (_, synchronizer) in self.registry.iter() {
            self.health.set_status(&synchronizer.name(), JobStatus::Running);
        }

        let mut tracker = DepletionTracker::default();
        for (owner, _) in self.registry.iter() {
            let nodes = owned_by(&topology, &reversed, owner);
            let depletion = self.depleter.deplete(&mut topology, &nodes, ArtefactPhase::Prepare);
            tracker.record(depletion, ArtefactPhase::Prepare);
        }
        for (owner, synchronizer) in self.registry.iter() {
            for phase in [ArtefactPhase::Create, ArtefactPhase::Update, ArtefactPhase::Start] {
                let nodes: Vec<usize> = owned_by(&topology, &order, owner)
                    .into_iter()
                    .filter(|&index| !tracker.is_fatal(index))
                    .collect();
                let depletion = self.depleter.deplete(&mut topology, &nodes, phase);
                tracker.record(depletion, phase);
            }
            tracing::debug!(synchronizer = %synchronizer.name(), "Phases depleted");
        }

        report.cross_rounds = self.cross_process(&mut topology, &order, &mut tracker);
        self.register_fatals(&mut topology, &tracker, report);
        self.register_errors(&mut topology, &tracker, report);

        for (owner, synchronizer) in self.registry.iter() {
            let failed = tracker
                .pending
                .keys()
                .chain(tracker.fatal.keys())
                .any(|&index| topology.node(index).is_some_and(|node| node.owner == owner));
            let status = if failed {
                JobStatus::Failed
            } else {
                JobStatus::Succeeded
            };
            self.health.set_status(&synchronizer.name(), status);
        }

        for (node, before) in topology.nodes().iter().zip(initial) {
            if node.artefact.lifecycle == before {
                continue;
            }
            match node.artefact.lifecycle {
                ArtefactLifecycle::Created => report.created += 1,
                ArtefactLifecycle::Updated => report.updated += 1,
                ArtefactLifecycle::Started => report.started += 1,
                _ => {}
            }
        }
    }

    /// Re-run all phases over the undepleted nodes of every synchronizer
    /// until a full round makes no progress
    ///
    /// Returns the number of rounds performed.
    fn cross_process(&self, topology: &mut Topology, order: &[usize], tracker: &mut DepletionTracker) -> usize {
        let mut rounds = 0;
        while !tracker.pending.is_empty() {
            rounds += 1;
            let nodes: Vec<usize> = order
                .iter()
                .copied()
                .filter(|index| tracker.pending.contains_key(index))
                .collect();
            tracing::warn!(count = nodes.len(), round = rounds, "Cross-processing undepleted artefacts");

            let mut left: BTreeMap<usize, ArtefactPhase> = BTreeMap::new();
            for phase in ArtefactPhase::ALL {
                let mut batch: Vec<usize> = nodes
                    .iter()
                    .copied()
                    .filter(|&index| !tracker.is_fatal(index))
                    .collect();
                if phase == ArtefactPhase::Prepare {
                    batch.reverse();
                }
                let depletion = self.depleter.deplete(topology, &batch, phase);
                for index in depletion.undepleted {
                    left.entry(index).or_insert(phase);
                }
                for (index, reason) in depletion.fatal {
                    tracker.fatal.entry(index).or_insert((phase, reason));
                }
            }
            left.retain(|index, _| !tracker.is_fatal(*index));

            let progressed = left.len() < nodes.len();
            tracker.pending = left;
            if !progressed {
                let keys = keys_of(topology, tracker.pending.keys().copied());
                tracing::error!("Undepleted artefacts left after cross-processing: {keys}");
                break;
            }
            if !tracker.pending.is_empty() {
                let keys = keys_of(topology, tracker.pending.keys().copied());
                tracing::warn!("Retrying to deplete artefacts left after cross-processing: {keys}");
            }
        }
        rounds
    }

    /// Mark permanently undepleted artefacts FAILED and record a problem
    fn register_errors(&self, topology: &mut Topology, tracker: &DepletionTracker, report: &mut SyncReport) {
        for (&index, &phase) in &tracker.pending {
            let Some(node) = topology.node_mut(index) else {
                continue;
            };
            let error_message = format!(
                "Undepleted Artefact of type: [{}] with key: [{}] in phase: [{}]",
                node.artefact.artefact_type,
                node.artefact.key,
                phase.target_lifecycle()
            );
            tracing::error!("{error_message}");
            report.errors.push(error_message.clone());

            let mut message = error_message;
            if let Some(error) = node.artefact.error.as_deref().filter(|e| !e.is_empty()) {
                message.push_str(" | ");
                message.push_str(error);
            }
            self.register_failure(node, &message, report);
            report.undepleted.push(node.artefact.key.clone());
        }
    }

    /// Mark artefacts that reported a fatal outcome FAILED and record a problem
    fn register_fatals(&self, topology: &mut Topology, tracker: &DepletionTracker, report: &mut SyncReport) {
        for (&index, (phase, reason)) in &tracker.fatal {
            let Some(node) = topology.node_mut(index) else {
                continue;
            };
            let error_message = format!(
                "Fatal undepleted Artefact of type: [{}] with key: [{}] in phase: [{}]",
                node.artefact.artefact_type,
                node.artefact.key,
                phase.target_lifecycle()
            );
            tracing::error!("{error_message}");
            report.errors.push(error_message.clone());

            let message = format!("{error_message} | {reason}");
            self.register_failure(node, &message, report);
            report.fatal.push(node.artefact.key.clone());
        }
    }

    fn register_failure(&self, node: &mut TopologyWrapper, message: &str, report: &mut SyncReport) {
        let synchronizer = Arc::clone(&node.synchronizer);
        if let Err(e) = synchronizer.set_status(&mut node.artefact, ArtefactLifecycle::Failed, Some(message)) {
            report
                .errors
                .push(format!("Failed to update status of {}: {e}", node.artefact.key));
        }
        report.failed += 1;

        let artefact = &node.artefact;
        let result = match self.problems.get_problem(artefact) {
            Ok(Some(_)) => self.problems.update_problem(artefact, message),
            Ok(None) => self.problems.save_problem(artefact, message),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            report
                .errors
                .push(format!("Failed to record problem for {}: {e}", artefact.key));
        }
    }

    /// Remove every persisted artefact whose source file no longer exists
    fn cleanup(&self, report: &mut SyncReport) {
        let root = NormalizedPath::new(&self.root);
        for (_, synchronizer) in self.registry.iter() {
            let artefacts = match synchronizer.service().get_all() {
                Ok(artefacts) => artefacts,
                Err(e) => {
                    report.errors.push(format!(
                        "Failed to list artefacts of {}: {e}",
                        synchronizer.artefact_type()
                    ));
                    continue;
                }
            };
            for artefact in artefacts {
                if root.join(&artefact.location).exists() {
                    continue;
                }
                match synchronizer.cleanup(&artefact) {
                    Ok(()) => {
                        tracing::warn!(key = %artefact.key, "Cleaned up artefact of vanished definition");
                        report.cleaned_up.push(artefact.key);
                    }
                    Err(e) => {
                        let message = format!("Failed to clean up artefact {}: {e}", artefact.key);
                        tracing::error!(key = %artefact.key, error = %e, "Cleanup failed");
                        report.errors.push(message);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SynchronizationProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizationProcessor")
            .field("root", &self.root)
            .field("registry", &self.registry)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Nodes of `owner` in the given order
fn owned_by(topology: &Topology, order: &[usize], owner: usize) -> Vec<usize> {
    order
        .iter()
        .copied()
        .filter(|&index| topology.node(index).is_some_and(|node| node.owner == owner))
        .collect()
}

fn keys_of(topology: &Topology, indices: impl Iterator<Item = usize>) -> String {
    indices
        .filter_map(|index| topology.node(index).map(|node| node.artefact.key.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
