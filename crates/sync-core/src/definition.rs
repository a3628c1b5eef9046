//! Definitions: persisted records of known source files
//!
//! A [`Definition`] tracks the parse freshness of one file in the registry.
//! Its state is orthogonal to the lifecycle of the artefacts parsed from it:
//!
//! ```text
//! NEW | MODIFIED --parse--> PARSED | BROKEN
//! PARSED --checksum changed--> MODIFIED
//! BROKEN --checksum changed--> MODIFIED
//! any --file vanished--> DELETED --file reappeared--> NEW
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use sync_fs::compute_checksum;

use crate::Result;
use crate::store::{Record, RecordStore};

/// Parse freshness of a definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefinitionState {
    #[default]
    New,
    Modified,
    Parsed,
    Broken,
    Deleted,
}

impl fmt::Display for DefinitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Modified => "MODIFIED",
            Self::Parsed => "PARSED",
            Self::Broken => "BROKEN",
            Self::Deleted => "DELETED",
        };
        f.write_str(name)
    }
}

/// Persisted record of a source file in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Registry location, unique key of the definition
    pub location: String,
    /// File stem
    pub name: String,
    /// Artefact type of the owning synchronizer
    #[serde(rename = "type")]
    pub definition_type: String,
    /// Content checksum (`sha256:<hex>`)
    pub checksum: String,
    /// Content loaded by the last scan; never persisted
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    #[serde(default)]
    pub state: DefinitionState,
    /// Parse error or deletion notice, empty otherwise
    #[serde(default)]
    pub message: String,
    /// Last state or checksum change
    pub updated_at: DateTime<Utc>,
}

impl Definition {
    /// Create a definition in state NEW for freshly read content
    pub fn new(
        location: impl Into<String>,
        name: impl Into<String>,
        definition_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            location: location.into(),
            name: name.into(),
            definition_type: definition_type.into(),
            checksum: compute_checksum(&content),
            content: Some(content),
            state: DefinitionState::New,
            message: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// The definition key: its location
    pub fn key(&self) -> &str {
        &self.location
    }

    /// Move to `state` with `message` and bump the timestamp
    pub fn transition(&mut self, state: DefinitionState, message: impl Into<String>) {
        self.state = state;
        self.message = message.into();
        self.updated_at = Utc::now();
    }
}

impl Record for Definition {
    fn record_key(&self) -> &str {
        &self.location
    }
}

/// Storage-agnostic accessor for persisted definitions
pub trait DefinitionStore: Send + Sync {
    /// All known definitions
    fn get_all(&self) -> Result<Vec<Definition>>;

    /// Find a definition by its key (location)
    fn find_by_key(&self, location: &str) -> Result<Option<Definition>>;

    /// Insert or update a definition
    fn save(&self, definition: &Definition) -> Result<()>;

    /// Delete a definition by its key (location)
    fn delete(&self, location: &str) -> Result<()>;
}

impl DefinitionStore for RecordStore<Definition> {
    fn get_all(&self) -> Result<Vec<Definition>> {
        Ok(self.all())
    }

    fn find_by_key(&self, location: &str) -> Result<Option<Definition>> {
        Ok(self.get(location))
    }

    fn save(&self, definition: &Definition) -> Result<()> {
        self.upsert(definition.clone())
    }

    fn delete(&self, location: &str) -> Result<()> {
        self.remove(location).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_definition_has_checksum_and_content() {
        let definition = Definition::new("/shop/orders.table", "orders", "table", b"{}".to_vec());

        assert_eq!(definition.key(), "/shop/orders.table");
        assert_eq!(definition.state, DefinitionState::New);
        assert_eq!(definition.checksum, compute_checksum(b"{}"));
        assert_eq!(definition.content.as_deref(), Some(&b"{}"[..]));
        assert!(definition.message.is_empty());
    }

    #[test]
    fn transition_sets_state_and_message() {
        let mut definition = Definition::new("/a.table", "a", "table", Vec::new());
        let before = definition.updated_at;

        definition.transition(DefinitionState::Broken, "unexpected token");

        assert_eq!(definition.state, DefinitionState::Broken);
        assert_eq!(definition.message, "unexpected token");
        assert!(definition.updated_at >= before);
    }

    #[test]
    fn content_is_not_persisted() {
        let definition = Definition::new("/a.table", "a", "table", b"secret".to_vec());
        let text = serde_json::to_string(&definition).unwrap();

        assert!(!text.contains("content"));
        assert!(text.contains("\"state\":\"NEW\""));

        let back: Definition = serde_json::from_str(&text).unwrap();
        assert_eq!(back.content, None);
        assert_eq!(back.checksum, definition.checksum);
    }

    #[test]
    fn record_store_implements_definition_store() {
        let store: RecordStore<Definition> = RecordStore::in_memory();
        let definition = Definition::new("/a.table", "a", "table", Vec::new());

        store.save(&definition).unwrap();
        assert!(store.find_by_key("/a.table").unwrap().is_some());
        assert_eq!(DefinitionStore::get_all(&store).unwrap().len(), 1);

        DefinitionStore::delete(&store, "/a.table").unwrap();
        assert!(store.find_by_key("/a.table").unwrap().is_none());
    }
}
