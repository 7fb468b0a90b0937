// src/dag/snapshot.rs

//! Owned, read-only views of a running build.
//!
//! Observers (progress output, reports) get a [`BuildSnapshot`] copy; the
//! live job table stays private to the scheduler.

use std::time::Duration;

use serde::Serialize;

use crate::dag::job::BuildStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub layer: usize,
    pub status: BuildStatus,
    /// Time between dispatch and the final status. `None` until finished,
    /// and for jobs that never ran.
    pub run_time: Option<Duration>,
    pub in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSnapshot {
    /// Ordered by layer, then declaration order.
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
    pub finished: usize,
    pub in_flight: usize,
    pub has_errors: bool,
    pub was_aborted: bool,
    pub elapsed: Duration,
}

impl BuildSnapshot {
    pub fn job(&self, id: &str) -> Option<&JobSnapshot> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<BuildStatus> {
        self.job(id).map(|job| job.status)
    }

    pub fn count(&self, status: BuildStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }
}
