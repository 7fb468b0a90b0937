// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] defines the [`Executor`] trait and the handle/reporter pair
//!   an execution is observed through.
//! - [`task_runner`] provides [`ShellExecutor`], which runs each job's
//!   configured command as a child process.

pub mod backend;
pub mod task_runner;

pub use backend::{ExecutionHandle, ExecutionOutcome, ExecutionReporter, Executor, HandleState};
pub use task_runner::{JobCommand, ShellExecutor};
