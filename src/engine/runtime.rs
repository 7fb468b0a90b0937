// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::dag::{BuildSnapshot, Scheduled, ScheduledJob, Scheduler};
use crate::errors::Result;
use crate::exec::Executor;
use crate::time::format_duration;

/// Idle sleep between scheduling rounds when nothing finished.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Overall outcome of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    /// Finished, but at least one job failed or was skipped for it.
    Failure,
    /// Cancelled, timed out, or stopped with work left.
    Aborted,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildResult::Success => f.write_str("SUCCESS"),
            BuildResult::Failure => f.write_str("FAILURE"),
            BuildResult::Aborted => f.write_str("ABORTED"),
        }
    }
}

/// Result of [`Runtime::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub result: BuildResult,
    pub snapshot: BuildSnapshot,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.result == BuildResult::Success
    }
}

/// Drives a [`Scheduler`] to completion, handing jobs to an [`Executor`].
pub struct Runtime<E: Executor> {
    scheduler: Scheduler,
    executor: E,
    poll_interval: Duration,
}

impl<E: Executor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Runtime<E> {
    pub fn new(scheduler: Scheduler, executor: E) -> Self {
        Self {
            scheduler,
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Main loop.
    ///
    /// - Submits every job the scheduler offers and registers its handle.
    /// - On WAIT, ejects finished executions or sleeps for the poll interval.
    /// - Stops on FINISHED, ABORT, an exceeded build deadline, or `shutdown`.
    ///
    /// Dropping the `shutdown` sender without sending does not stop the build.
    pub async fn run(mut self, shutdown: oneshot::Receiver<()>) -> Result<BuildReport> {
        info!("build started");
        let mut shutdown = Some(shutdown);
        let mut stopped = false;

        while self.scheduler.has_next() {
            match self.scheduler.get_next() {
                Scheduled::Finished => break,
                Scheduled::Abort => {
                    debug!("scheduler requested abort");
                    stopped = true;
                    break;
                }
                Scheduled::Wait => {
                    if self.scheduler.build_time_exceeded() {
                        warn!(
                            max_build_time = %format_duration(self.scheduler.settings().max_duration),
                            "max build time exceeded; aborting build"
                        );
                        self.scheduler.abort_all();
                        break;
                    }
                    if !self.wait_for_progress(&mut shutdown).await? {
                        info!("shutdown requested; aborting build");
                        self.scheduler.abort_all();
                        break;
                    }
                }
                Scheduled::Job(job) => self.dispatch(job).await?,
            }
        }

        // An aborted job ends the loop while siblings may still run.
        if self.scheduler.in_flight() > 0 {
            self.scheduler.abort_all();
        }

        let result = self.result(stopped);
        let snapshot = self.scheduler.snapshot();
        info!(
            result = %result,
            finished = snapshot.finished,
            total = snapshot.total,
            elapsed = %format_duration(snapshot.elapsed),
            "build finished"
        );
        Ok(BuildReport { result, snapshot })
    }

    async fn dispatch(&mut self, job: ScheduledJob) -> Result<()> {
        match self.executor.submit(&job).await {
            Ok(handle) => self.scheduler.register(&job, handle),
            Err(err) => {
                error!(job = %job.id, error = %err, "executor refused job");
                self.scheduler.error_build(&job.id)
            }
        }
    }

    /// `false` when shutdown was requested.
    async fn wait_for_progress(
        &mut self,
        shutdown: &mut Option<oneshot::Receiver<()>>,
    ) -> Result<bool> {
        let ejected = tokio::select! {
            ejected = self.scheduler.eject_finished_builds() => ejected?,
            _ = shutdown_requested(shutdown) => return Ok(false),
        };

        if ejected == 0 {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown_requested(shutdown) => return Ok(false),
            }
        }
        Ok(true)
    }

    fn result(&self, stopped: bool) -> BuildResult {
        if self.scheduler.was_aborted() {
            BuildResult::Aborted
        } else if self.scheduler.has_build_errors() {
            BuildResult::Failure
        } else if stopped {
            BuildResult::Aborted
        } else {
            BuildResult::Success
        }
    }
}

/// Resolves when a shutdown is sent. Never resolves once the sender is gone.
async fn shutdown_requested(shutdown: &mut Option<oneshot::Receiver<()>>) {
    if let Some(rx) = shutdown {
        if rx.await.is_ok() {
            return;
        }
        *shutdown = None;
    }
    std::future::pending::<()>().await
}
