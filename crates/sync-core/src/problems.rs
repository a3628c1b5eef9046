//! Synchronization problems
//!
//! Every artefact that ends a run undepleted gets exactly one problem
//! record, created on first failure and updated on later ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::artefact::Artefact;
use crate::store::{Record, RecordStore};

/// Category of problems raised by the synchronization engine
pub const SYNCHRONIZATION_CATEGORY: &str = "SYNCHRONIZER";

/// A recorded failure of one artefact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    /// Key of the failed artefact
    pub artefact_key: String,
    #[serde(rename = "type")]
    pub artefact_type: String,
    /// Registry location of the artefact's definition
    pub location: String,
    pub category: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    /// Create a synchronization problem for `artefact`
    pub fn for_artefact(artefact: &Artefact, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            artefact_key: artefact.key.clone(),
            artefact_type: artefact.artefact_type.clone(),
            location: artefact.location.clone(),
            category: SYNCHRONIZATION_CATEGORY.to_string(),
            message: message.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Problem {
    fn record_key(&self) -> &str {
        &self.artefact_key
    }
}

/// Sink for per-artefact synchronization problems
pub trait ProblemSink: Send + Sync {
    /// Get the problem recorded for `artefact`, if any
    fn get_problem(&self, artefact: &Artefact) -> Result<Option<Problem>>;

    /// Record a new problem for `artefact`
    fn save_problem(&self, artefact: &Artefact, message: &str) -> Result<()>;

    /// Replace the message of the problem recorded for `artefact`
    fn update_problem(&self, artefact: &Artefact, message: &str) -> Result<()>;
}

/// Problem sink kept in memory or mirrored to a JSON file
pub type ProblemStore = RecordStore<Problem>;

impl ProblemSink for RecordStore<Problem> {
    fn get_problem(&self, artefact: &Artefact) -> Result<Option<Problem>> {
        Ok(self.get(&artefact.key))
    }

    fn save_problem(&self, artefact: &Artefact, message: &str) -> Result<()> {
        self.upsert(Problem::for_artefact(artefact, message))
    }

    fn update_problem(&self, artefact: &Artefact, message: &str) -> Result<()> {
        let problem = match self.get(&artefact.key) {
            Some(mut problem) => {
                problem.message = message.to_string();
                problem.updated_at = Utc::now();
                problem
            }
            None => Problem::for_artefact(artefact, message),
        };
        self.upsert(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_keeps_identity_and_creation_time() {
        let store = ProblemStore::in_memory();
        let artefact = Artefact::new("view", "/shop/totals.view", "totals");

        store.save_problem(&artefact, "first").unwrap();
        let first = store.get_problem(&artefact).unwrap().unwrap();

        store.update_problem(&artefact, "second").unwrap();
        let second = store.get_problem(&artefact).unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.message, "second");
        assert_eq!(second.category, SYNCHRONIZATION_CATEGORY);
    }

    #[test]
    fn missing_problem_is_none() {
        let store = ProblemStore::in_memory();
        let artefact = Artefact::new("view", "/shop/totals.view", "totals");
        assert!(store.get_problem(&artefact).unwrap().is_none());
    }
}
