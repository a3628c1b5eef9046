//! Per-synchronizer job health

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of one synchronizer's job in the latest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

/// Write-only health sink fed by the engine
pub trait HealthSink: Send + Sync {
    fn set_status(&self, job: &str, status: JobStatus);
}

/// In-memory health sink that remembers the last status per job
#[derive(Debug, Default)]
pub struct HealthRegistry {
    jobs: Mutex<BTreeMap<String, JobStatus>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last status reported for `job`
    pub fn status(&self, job: &str) -> Option<JobStatus> {
        self.jobs.lock().get(job).copied()
    }

    /// Snapshot of every job and its status, ordered by job name
    pub fn jobs(&self) -> Vec<(String, JobStatus)> {
        self.jobs
            .lock()
            .iter()
            .map(|(job, status)| (job.clone(), *status))
            .collect()
    }
}

impl HealthSink for HealthRegistry {
    fn set_status(&self, job: &str, status: JobStatus) {
        tracing::trace!(job, ?status, "Job status changed");
        self.jobs.lock().insert(job.to_string(), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_status_wins() {
        let health = HealthRegistry::new();
        health.set_status("table-synchronizer", JobStatus::Running);
        health.set_status("table-synchronizer", JobStatus::Succeeded);

        assert_eq!(health.status("table-synchronizer"), Some(JobStatus::Succeeded));
        assert_eq!(health.status("view-synchronizer"), None);
        assert_eq!(health.jobs().len(), 1);
    }
}
