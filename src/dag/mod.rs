// src/dag/mod.rs

//! Job graph and scheduling.
//!
//! - [`settings`] holds per-job and whole-build settings.
//! - [`job`] defines build jobs and their status.
//! - [`layers`] turns parsed jobs into dependency layers, or a cycle witness.
//! - [`graph`] exports the graph to `petgraph` / Graphviz DOT.
//! - [`scheduler`] contains the state machine that decides which job runs
//!   next, and [`dispatch`] the bounded set of executions it tracks.
//! - [`snapshot`] provides owned views of a running build for observers.

pub mod dispatch;
pub mod graph;
pub mod job;
pub mod layers;
pub mod scheduler;
pub mod settings;
pub mod snapshot;

pub use graph::{render_dot, to_dependency_graph};
pub use job::{BuildJob, BuildStatus};
pub use layers::{BuildLayers, topological_sort};
pub use scheduler::{Scheduled, ScheduledJob, Scheduler};
pub use settings::{
    ANY_AGENT, BuildAgent, BuildSettings, ParentFailureMode, SchedulerSettings, Throttle,
};
pub use snapshot::{BuildSnapshot, JobSnapshot};
