//! Dependency ordering and phased depletion of artefacts
//!
//! - [`Topology`] wraps every artefact of a run with its owning synchronizer
//!   and resolves dependency keys to sibling nodes
//! - [`TopologicalSorter`] orders nodes dependencies first and reports cycles
//! - [`TopologicalDepleter`] drives one phase over a node set to a fixpoint

mod depleter;
mod sorter;
mod wrapper;

pub use depleter::{Depletion, TopologicalDepleter};
pub use sorter::{CycleError, SortOutcome, TopologicalSorter};
pub use wrapper::{Topology, TopologyWrapper};

/// A graph node that can be ordered by its dependencies
pub trait TopologicallySortable {
    /// Unique id of the node
    fn id(&self) -> &str;

    /// Ids of the nodes this one depends on
    fn dependency_ids(&self) -> &[String];
}
