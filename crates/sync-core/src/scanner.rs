//! Change scanning
//!
//! Walks the registry root, checksums every file an accepting synchronizer
//! owns and classifies it against the persisted [`Definition`] records:
//!
//! | stored               | checksum | result                           |
//! |----------------------|----------|----------------------------------|
//! | none                 | -        | NEW, persisted, enqueued         |
//! | DELETED              | any      | NEW, persisted, enqueued         |
//! | any other            | changed  | MODIFIED, persisted, enqueued    |
//! | NEW/MODIFIED/BROKEN  | same     | enqueued unchanged               |
//! | PARSED               | same     | enqueued for retrieval           |

use std::collections::HashSet;
use std::path::Path;

use sync_fs::{NormalizedPath, compute_checksum, io, walk_files};

use crate::Result;
use crate::definition::{Definition, DefinitionState, DefinitionStore};
use crate::synchronizer::SynchronizerRegistry;

/// Outcome of one scan
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Definitions to dispatch, one queue per synchronizer in registration order
    pub queues: Vec<Vec<Definition>>,
    /// Locations of every accepted file seen, readable or not
    pub observed: HashSet<String>,
    /// Files that could not be read
    pub errors: Vec<String>,
    /// Definitions created in this scan
    pub new: usize,
    /// Definitions whose content changed
    pub modified: usize,
}

impl ScanResult {
    /// Total number of enqueued definitions
    pub fn enqueued(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}

/// Reads the content of one registry file
type ContentReader = fn(&NormalizedPath) -> sync_fs::Result<Vec<u8>>;

/// Classifies registry files against the definition store
pub struct ChangeScanner<'a> {
    root: &'a Path,
    registry: &'a SynchronizerRegistry,
    store: &'a dyn DefinitionStore,
    read: ContentReader,
}

impl<'a> ChangeScanner<'a> {
    pub fn new(root: &'a Path, registry: &'a SynchronizerRegistry, store: &'a dyn DefinitionStore) -> Self {
        Self {
            root,
            registry,
            store,
            read: io::read_bytes,
        }
    }

    #[cfg(test)]
    fn with_reader(mut self, read: ContentReader) -> Self {
        self.read = read;
        self
    }

    /// Walk the registry and enqueue every definition that needs dispatch
    ///
    /// # Errors
    ///
    /// Fails only when the root is unreachable or the definition store
    /// cannot be read or written. Unreadable files are recorded and skipped.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult {
            queues: vec![Vec::new(); self.registry.len()],
            ..ScanResult::default()
        };

        for file in walk_files(self.root)? {
            let Some((owner, synchronizer)) = self.registry.find_for_path(&file.path) else {
                continue;
            };
            result.observed.insert(file.location.clone());

            let content = match (self.read)(&NormalizedPath::new(&file.path)) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(location = %file.location, error = %e, "Skipping unreadable definition");
                    result.errors.push(format!("Cannot read {}: {e}", file.location));
                    continue;
                }
            };
            let checksum = compute_checksum(&content);

            let definition = match self.store.find_by_key(&file.location)? {
                None => {
                    let name = file
                        .path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let definition =
                        Definition::new(&file.location, name, synchronizer.artefact_type(), content);
                    self.store.save(&definition)?;
                    tracing::debug!(location = %definition.location, "New definition");
                    result.new += 1;
                    definition
                }
                Some(mut definition) if definition.state == DefinitionState::Deleted => {
                    definition.checksum = checksum;
                    definition.content = Some(content);
                    definition.transition(DefinitionState::New, "");
                    self.store.save(&definition)?;
                    tracing::debug!(location = %definition.location, "Definition reappeared");
                    result.new += 1;
                    definition
                }
                Some(mut definition) if definition.checksum != checksum => {
                    definition.checksum = checksum;
                    definition.content = Some(content);
                    definition.transition(DefinitionState::Modified, "");
                    self.store.save(&definition)?;
                    tracing::debug!(location = %definition.location, "Definition modified");
                    result.modified += 1;
                    definition
                }
                Some(mut definition) => {
                    definition.content = Some(content);
                    definition
                }
            };
            result.queues[owner].push(definition);
        }

        tracing::debug!(
            new = result.new,
            modified = result.modified,
            enqueued = result.enqueued(),
            "Registry scanned"
        );
        Ok(result)
    }

    /// Mark every stored definition that was not observed as DELETED
    ///
    /// Returns the definitions that changed state in this call.
    pub fn mark_deleted(&self, observed: &HashSet<String>) -> Result<Vec<Definition>> {
        let mut deleted = Vec::new();
        for mut definition in self.store.get_all()? {
            if observed.contains(&definition.location) || definition.state == DefinitionState::Deleted {
                continue;
            }
            let message = format!("Definition deleted: {}", definition.location);
            definition.transition(DefinitionState::Deleted, message);
            definition.content = None;
            self.store.save(&definition)?;
            tracing::warn!(location = %definition.location, "Definition deleted");
            deleted.push(definition);
        }
        Ok(deleted)
    }
}
