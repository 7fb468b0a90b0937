// src/engine/mod.rs

//! Build orchestration.
//!
//! The scheduler in [`crate::dag`] only answers "what next?". The
//! [`Runtime`] owns it together with an [`Executor`](crate::exec::Executor)
//! and keeps asking until the build is finished, failed or aborted.

pub mod runtime;

pub use runtime::{BuildReport, BuildResult, DEFAULT_POLL_INTERVAL, Runtime};
