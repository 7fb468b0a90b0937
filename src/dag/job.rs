// src/dag/job.rs

use std::fmt;

use serde::Serialize;

use crate::dag::settings::BuildSettings;

/// Lifecycle of a job within one build.
///
/// `None -> InProgress -> terminal`. `NoBuild` is only assigned when a partial
/// build is seeded and `ParentError` only by the scheduler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    #[default]
    None,
    InProgress,
    Success,
    Error,
    ParentError,
    Abort,
    NoBuild,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::None | BuildStatus::InProgress)
    }

    /// Statuses that block children running under the `ABORT` policy.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            BuildStatus::Error | BuildStatus::ParentError | BuildStatus::Abort
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::None => "NONE",
            BuildStatus::InProgress => "IN_PROGRESS",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Error => "ERROR",
            BuildStatus::ParentError => "PARENT_ERROR",
            BuildStatus::Abort => "ABORT",
            BuildStatus::NoBuild => "NO_BUILD",
        };
        f.write_str(s)
    }
}

/// Runtime node. Children are indices into the owning
/// [`BuildLayers`](crate::dag::BuildLayers) job table.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub id: String,
    pub settings: BuildSettings,
    pub children: Vec<usize>,
    pub status: BuildStatus,
}

impl BuildJob {
    pub fn new(id: impl Into<String>, settings: BuildSettings) -> Self {
        Self {
            id: id.into(),
            settings,
            children: Vec::new(),
            status: BuildStatus::None,
        }
    }
}
