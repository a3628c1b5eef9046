//! Fixpoint execution of one lifecycle phase

use super::Topology;
use crate::artefact::ArtefactPhase;
use crate::synchronizer::PhaseOutcome;

/// Default upper bound on sweeps per phase
pub const DEFAULT_MAX_SWEEPS: usize = 100;

/// Result of depleting one phase over a node set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depletion {
    /// Nodes that did not complete the phase, in input order
    pub undepleted: Vec<usize>,
    /// Nodes that reported a fatal outcome, with the reason
    pub fatal: Vec<(usize, String)>,
    /// Number of nodes that completed the phase
    pub completed: usize,
    /// Number of sweeps performed
    pub sweeps: usize,
}

impl Depletion {
    pub fn is_complete(&self) -> bool {
        self.undepleted.is_empty() && self.fatal.is_empty()
    }
}

/// Repeatedly runs one phase over a node set until no further progress
#[derive(Debug, Clone, Copy)]
pub struct TopologicalDepleter {
    max_sweeps: usize,
}

impl Default for TopologicalDepleter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SWEEPS)
    }
}

impl TopologicalDepleter {
    pub fn new(max_sweeps: usize) -> Self {
        Self {
            max_sweeps: max_sweeps.max(1),
        }
    }

    pub fn max_sweeps(&self) -> usize {
        self.max_sweeps
    }

    /// Deplete `phase` over `nodes`, visited in the given order on every sweep
    ///
    /// A sweep asks every pending node's synchronizer to complete the phase.
    /// Sweeping stops when a sweep removes no node from the pending set or
    /// the sweep cap is reached. A failure reason is attached to the node's
    /// artefact and the node stays pending; fatal nodes leave the set.
    pub fn deplete(&self, topology: &mut Topology, nodes: &[usize], phase: ArtefactPhase) -> Depletion {
        let mut depletion = Depletion::default();
        let mut pending = nodes.to_vec();

        while !pending.is_empty() {
            if depletion.sweeps == self.max_sweeps {
                tracing::warn!(%phase, pending = pending.len(), sweeps = depletion.sweeps, "Depletion stopped at sweep limit");
                break;
            }
            depletion.sweeps += 1;

            let before = pending.len();
            let mut remaining = Vec::with_capacity(before);
            for index in pending {
                match topology.complete(index, phase) {
                    PhaseOutcome::Completed => depletion.completed += 1,
                    PhaseOutcome::Pending => remaining.push(index),
                    PhaseOutcome::Failed(reason) => {
                        if let Some(node) = topology.node_mut(index) {
                            tracing::debug!(key = %node.artefact.key, %phase, %reason, "Phase failed");
                            node.artefact.error = Some(reason);
                        }
                        remaining.push(index);
                    }
                    PhaseOutcome::Fatal(reason) => depletion.fatal.push((index, reason)),
                }
            }

            let progressed = remaining.len() < before;
            pending = remaining;
            if !progressed {
                break;
            }
        }

        tracing::debug!(
            %phase,
            completed = depletion.completed,
            undepleted = pending.len(),
            sweeps = depletion.sweeps,
            "Depleted phase"
        );
        depletion.undepleted = pending;
        depletion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::{Artefact, ArtefactLifecycle};
    use crate::store::RecordStore;
    use crate::synchronizer::{GenericSynchronizer, SynchronizerRegistry};
    use std::sync::Arc;

    fn registry() -> SynchronizerRegistry {
        SynchronizerRegistry::new().with(Arc::new(GenericSynchronizer::new(
            "table",
            ".table",
            Arc::new(RecordStore::in_memory()),
        )))
    }

    fn table(name: &str, deps: &[&str]) -> (usize, Artefact) {
        let artefact = Artefact::new("table", format!("/{name}.table"), name)
            .with_dependencies(deps.iter().map(|d| format!("table:/{d}.table:{d}")).collect());
        (0, artefact)
    }

    #[test]
    fn test_reverse_order_converges_over_sweeps() {
        // c -> b -> a, visited dependents first
        let mut topology = Topology::build(vec![table("c", &["b"]), table("b", &["a"]), table("a", &[])], &registry());

        let depletion = TopologicalDepleter::default().deplete(&mut topology, &[0, 1, 2], ArtefactPhase::Create);

        assert!(depletion.is_complete());
        assert_eq!(depletion.completed, 3);
        assert_eq!(depletion.sweeps, 3);
        assert!(topology.nodes().iter().all(|n| n.artefact.lifecycle == ArtefactLifecycle::Created));
    }

    #[test]
    fn test_failure_stays_undepleted_with_reason() {
        let mut topology = Topology::build(vec![table("a", &["missing"]), table("b", &[])], &registry());

        let depletion = TopologicalDepleter::default().deplete(&mut topology, &[0, 1], ArtefactPhase::Create);

        assert_eq!(depletion.undepleted, vec![0]);
        assert_eq!(depletion.completed, 1);
        assert_eq!(depletion.sweeps, 2);
        let error = topology.nodes()[0].artefact.error.clone().unwrap();
        assert!(error.contains("Unresolved dependency"));
    }

    #[test]
    fn test_cycle_members_are_undepleted() {
        let mut topology = Topology::build(vec![table("a", &["b"]), table("b", &["a"])], &registry());

        let depletion = TopologicalDepleter::default().deplete(&mut topology, &[0, 1], ArtefactPhase::Create);

        assert_eq!(depletion.undepleted, vec![0, 1]);
        assert_eq!(depletion.sweeps, 1);
    }

    #[test]
    fn test_fatal_leaves_the_set() {
        let mut topology = Topology::build(vec![table("a", &["a"])], &registry());

        let depletion = TopologicalDepleter::default().deplete(&mut topology, &[0], ArtefactPhase::Create);

        assert!(depletion.undepleted.is_empty());
        assert_eq!(depletion.fatal.len(), 1);
        assert!(!depletion.is_complete());
    }

    #[test]
    fn test_sweep_cap() {
        let mut topology = Topology::build(vec![table("c", &["b"]), table("b", &["a"]), table("a", &[])], &registry());

        let depletion = TopologicalDepleter::new(1).deplete(&mut topology, &[0, 1, 2], ArtefactPhase::Create);

        assert_eq!(depletion.sweeps, 1);
        assert_eq!(depletion.completed, 1);
        assert_eq!(depletion.undepleted, vec![0, 1]);
    }

    #[test]
    fn test_empty_set_needs_no_sweep() {
        let mut topology = Topology::default();
        let depletion = TopologicalDepleter::default().deplete(&mut topology, &[], ArtefactPhase::Start);
        assert_eq!(depletion, Depletion::default());
    }
}
