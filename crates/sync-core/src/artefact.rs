//! Artefact envelope, lifecycle and phases
//!
//! An [`Artefact`] is the unit a synchronizer deploys. The engine only ever
//! touches its common fields; everything type specific lives in the opaque
//! JSON `payload` owned by the synchronizer that parsed it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::store::Record;

/// Separator between the parts of an artefact key
pub const KEY_SEPARATOR: char = ':';

/// Position of an artefact in the deployment pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactLifecycle {
    #[default]
    New,
    Modified,
    Prepared,
    Created,
    Updated,
    Started,
    Failed,
    Deleted,
}

impl ArtefactLifecycle {
    /// Whether the artefact is live (created, updated or started)
    pub fn is_deployed(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Started)
    }
}

impl fmt::Display for ArtefactLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Modified => "MODIFIED",
            Self::Prepared => "PREPARED",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Started => "STARTED",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
        };
        f.write_str(name)
    }
}

/// Lifecycle phase executed by the depleter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactPhase {
    Prepare,
    #[default]
    Create,
    Update,
    Start,
}

impl ArtefactPhase {
    /// All phases in execution order
    pub const ALL: [ArtefactPhase; 4] = [Self::Prepare, Self::Create, Self::Update, Self::Start];

    /// Lifecycle an artefact reaches when this phase completes
    pub fn target_lifecycle(self) -> ArtefactLifecycle {
        match self {
            Self::Prepare => ArtefactLifecycle::Prepared,
            Self::Create => ArtefactLifecycle::Created,
            Self::Update => ArtefactLifecycle::Updated,
            Self::Start => ArtefactLifecycle::Started,
        }
    }
}

impl fmt::Display for ArtefactPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prepare => "PREPARE",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Start => "START",
        };
        f.write_str(name)
    }
}

/// A parsed, typed deployable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artefact {
    /// Globally unique key: `<type>:<location>:<name>`
    pub key: String,
    /// Human readable name, usually the file stem
    pub name: String,
    /// Artefact type, matching its synchronizer
    #[serde(rename = "type")]
    pub artefact_type: String,
    /// Registry location of the source definition
    pub location: String,
    /// Pipeline position
    #[serde(default)]
    pub lifecycle: ArtefactLifecycle,
    /// Phase the artefact was scheduled for when it was parsed
    #[serde(default)]
    pub phase: ArtefactPhase,
    /// Keys of the artefacts this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Last error reported for this artefact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the artefact is currently running
    #[serde(default)]
    pub running: bool,
    /// Type specific content owned by the synchronizer
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Artefact {
    /// Create a new artefact in lifecycle NEW
    pub fn new(
        artefact_type: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let artefact_type = artefact_type.into();
        let location = location.into();
        let name = name.into();
        Self {
            key: Self::key_for(&artefact_type, &location, &name),
            name,
            artefact_type,
            location,
            lifecycle: ArtefactLifecycle::New,
            phase: ArtefactPhase::Create,
            dependencies: Vec::new(),
            error: None,
            running: false,
            payload: Value::Null,
        }
    }

    /// Build the key for an artefact of `artefact_type` at `location`
    pub fn key_for(artefact_type: &str, location: &str, name: &str) -> String {
        format!("{artefact_type}{KEY_SEPARATOR}{location}{KEY_SEPARATOR}{name}")
    }

    /// Recompute the key after the type, location or name changed
    pub fn update_key(&mut self) {
        self.key = Self::key_for(&self.artefact_type, &self.location, &self.name);
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

impl Record for Artefact {
    fn record_key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_combines_type_location_and_name() {
        let artefact = Artefact::new("table", "/shop/orders.table", "orders");
        assert_eq!(artefact.key, "table:/shop/orders.table:orders");
        assert_eq!(artefact.lifecycle, ArtefactLifecycle::New);
        assert_eq!(artefact.phase, ArtefactPhase::Create);
    }

    #[test]
    fn update_key_follows_renames() {
        let mut artefact = Artefact::new("table", "/shop/orders.table", "orders");
        artefact.name = "purchases".to_string();
        artefact.update_key();
        assert_eq!(artefact.key, "table:/shop/orders.table:purchases");
    }

    #[test]
    fn phases_target_their_lifecycle() {
        assert_eq!(ArtefactPhase::Prepare.target_lifecycle(), ArtefactLifecycle::Prepared);
        assert_eq!(ArtefactPhase::Create.target_lifecycle(), ArtefactLifecycle::Created);
        assert_eq!(ArtefactPhase::Update.target_lifecycle(), ArtefactLifecycle::Updated);
        assert_eq!(ArtefactPhase::Start.target_lifecycle(), ArtefactLifecycle::Started);
    }

    #[test]
    fn only_created_updated_and_started_are_deployed() {
        assert!(ArtefactLifecycle::Created.is_deployed());
        assert!(ArtefactLifecycle::Updated.is_deployed());
        assert!(ArtefactLifecycle::Started.is_deployed());
        assert!(!ArtefactLifecycle::New.is_deployed());
        assert!(!ArtefactLifecycle::Modified.is_deployed());
        assert!(!ArtefactLifecycle::Failed.is_deployed());
    }

    #[test]
    fn serializes_with_screaming_states_and_skips_empty_fields() {
        let artefact = Artefact::new("view", "/shop/totals.view", "totals");
        let value = serde_json::to_value(&artefact).unwrap();

        assert_eq!(value["type"], "view");
        assert_eq!(value["lifecycle"], "NEW");
        assert_eq!(value["phase"], "CREATE");
        assert!(value.get("error").is_none());
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn payload_survives_json_round_trip() {
        let artefact = Artefact::new("view", "/shop/totals.view", "totals")
            .with_payload(json!({"query": "select 1", "note": null}));
        let text = serde_json::to_string(&artefact).unwrap();
        let back: Artefact = serde_json::from_str(&text).unwrap();
        assert_eq!(back, artefact);
    }
}
