//! Graph nodes pairing artefacts with their synchronizers

use std::collections::HashMap;
use std::sync::Arc;

use super::{SortOutcome, TopologicalSorter, TopologicallySortable};
use crate::artefact::{Artefact, ArtefactPhase};
use crate::synchronizer::{DependencyState, PhaseOutcome, Synchronizer, SynchronizerRegistry};

/// An artefact together with the synchronizer that owns it
///
/// Transient: built for one run and never persisted.
pub struct TopologyWrapper {
    pub artefact: Artefact,
    pub synchronizer: Arc<dyn Synchronizer>,
    /// Registration index of the owning synchronizer
    pub owner: usize,
    /// Resolved dependencies as indices into the topology
    dependencies: Vec<usize>,
}

impl TopologyWrapper {
    /// Indices of the sibling nodes this node depends on
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }
}

impl TopologicallySortable for TopologyWrapper {
    fn id(&self) -> &str {
        &self.artefact.key
    }

    fn dependency_ids(&self) -> &[String] {
        &self.artefact.dependencies
    }
}

impl std::fmt::Debug for TopologyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyWrapper")
            .field("key", &self.artefact.key)
            .field("lifecycle", &self.artefact.lifecycle)
            .field("owner", &self.owner)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// All artefacts of a run with dependency keys resolved to node indices
#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<TopologyWrapper>,
    index: HashMap<String, usize>,
}

impl Topology {
    /// Wrap artefacts with their owners from `registry`
    ///
    /// Each entry is `(owner index, artefact)`. Entries whose owner is not
    /// registered and duplicate keys are dropped. Dependencies on keys that
    /// are not part of the topology stay unresolved; the owning synchronizer
    /// decides what that means.
    pub fn build(
        entries: impl IntoIterator<Item = (usize, Artefact)>,
        registry: &SynchronizerRegistry,
    ) -> Self {
        let mut topology = Self::default();

        for (owner, artefact) in entries {
            let Some(synchronizer) = registry.get(owner) else {
                tracing::warn!(key = %artefact.key, owner, "Artefact without a registered synchronizer");
                continue;
            };
            if topology.index.contains_key(&artefact.key) {
                tracing::warn!(key = %artefact.key, "Duplicate artefact key in topology");
                continue;
            }
            topology.index.insert(artefact.key.clone(), topology.nodes.len());
            topology.nodes.push(TopologyWrapper {
                artefact,
                synchronizer: Arc::clone(synchronizer),
                owner,
                dependencies: Vec::new(),
            });
        }

        for i in 0..topology.nodes.len() {
            let resolved: Vec<usize> = topology.nodes[i]
                .artefact
                .dependencies
                .iter()
                .filter_map(|key| topology.index.get(key).copied())
                .collect();
            topology.nodes[i].dependencies = resolved;
        }

        topology
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TopologyWrapper] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&TopologyWrapper> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut TopologyWrapper> {
        self.nodes.get_mut(index)
    }

    /// Index of the node holding the artefact with `key`
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Sort all nodes dependencies first
    pub fn sort(&self) -> SortOutcome {
        TopologicalSorter::sort(&self.nodes)
    }

    /// Ask the owning synchronizer to complete `phase` for one node
    ///
    /// The synchronizer sees the current state of the node's resolved
    /// dependencies, including changes made earlier in the same sweep.
    pub fn complete(&mut self, index: usize, phase: ArtefactPhase) -> PhaseOutcome {
        let Some(node) = self.nodes.get(index) else {
            return PhaseOutcome::Fatal(format!("No topology node at index {index}"));
        };
        let dependencies: Vec<DependencyState> = node
            .dependencies
            .iter()
            .map(|&d| DependencyState::of(&self.nodes[d].artefact))
            .collect();

        let node = &mut self.nodes[index];
        let synchronizer = Arc::clone(&node.synchronizer);
        synchronizer.complete(&mut node.artefact, &dependencies, phase)
    }

    /// Unwrap the artefacts in node order
    pub fn into_artefacts(self) -> Vec<Artefact> {
        self.nodes.into_iter().map(|node| node.artefact).collect()
    }
}
