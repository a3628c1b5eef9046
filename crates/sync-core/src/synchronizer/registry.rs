//! Ordered registry of synchronizers

use std::path::Path;
use std::sync::Arc;

use super::Synchronizer;

/// Synchronizers in registration order
///
/// Selection is first-match: the earliest registered synchronizer that
/// accepts a file or type owns it. The same order drives phase execution.
#[derive(Clone, Default)]
pub struct SynchronizerRegistry {
    synchronizers: Vec<Arc<dyn Synchronizer>>,
}

impl SynchronizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronizer after all existing ones
    pub fn register(&mut self, synchronizer: Arc<dyn Synchronizer>) {
        tracing::debug!(
            artefact_type = synchronizer.artefact_type(),
            extension = synchronizer.file_extension(),
            "Registered synchronizer"
        );
        self.synchronizers.push(synchronizer);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, synchronizer: Arc<dyn Synchronizer>) -> Self {
        self.register(synchronizer);
        self
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Synchronizer>> {
        self.synchronizers.get(index)
    }

    /// Synchronizers with their registration index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<dyn Synchronizer>)> {
        self.synchronizers.iter().enumerate()
    }

    /// The synchronizer owning the definition file at `path`
    pub fn find_for_path(&self, path: &Path) -> Option<(usize, &Arc<dyn Synchronizer>)> {
        self.iter().find(|(_, s)| s.is_accepted(path))
    }

    /// The synchronizer owning artefacts of `artefact_type`
    pub fn find_for_type(&self, artefact_type: &str) -> Option<(usize, &Arc<dyn Synchronizer>)> {
        self.iter().find(|(_, s)| s.is_accepted_type(artefact_type))
    }

    /// Artefact types in registration order
    pub fn artefact_types(&self) -> Vec<String> {
        self.synchronizers
            .iter()
            .map(|s| s.artefact_type().to_string())
            .collect()
    }
}

impl std::fmt::Debug for SynchronizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizerRegistry")
            .field("types", &self.artefact_types())
            .finish()
    }
}
