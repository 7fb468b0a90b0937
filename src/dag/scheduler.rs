// src/dag/scheduler.rs

//! Layer-aware dispatch state machine.
//!
//! The scheduler hands out one job per [`Scheduler::get_next`] call and
//! learns about results through [`Scheduler::finish_build`] or by ejecting
//! registered executions with [`Scheduler::eject_finished_builds`]. It never
//! runs anything itself; see [`crate::engine::Runtime`] for the loop that
//! drives it.
//!
//! Every call scans all layers from the first unfinished one, so a fast
//! branch keeps going while a slow job in an earlier layer is still running,
//! as long as the job's own parents are done.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::dispatch::{Dispatch, DispatchSlots};
use crate::dag::job::BuildStatus;
use crate::dag::layers::BuildLayers;
use crate::dag::settings::{BuildAgent, ParentFailureMode, SchedulerSettings};
use crate::dag::snapshot::{BuildSnapshot, JobSnapshot};
use crate::errors::{BuildGraphError, Result};
use crate::exec::{ExecutionHandle, ExecutionOutcome, HandleState};
use crate::time::format_duration;
use crate::types::Edition;

/// A job handed out for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: String,
    pub agents: Vec<BuildAgent>,
    /// min(job maxDuration, build maxDuration).
    pub max_duration: Duration,
    pub weight: u32,
}

/// Answer of [`Scheduler::get_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduled {
    /// Submit this job, then register its handle.
    Job(ScheduledJob),
    /// Nothing to do right now, but the build can still make progress.
    Wait,
    /// Stop: the build was aborted, or every remaining job is blocked by a
    /// failed parent.
    Abort,
    Finished,
}

impl Scheduled {
    pub fn job(&self) -> Option<&ScheduledJob> {
        match self {
            Scheduled::Job(job) => Some(job),
            _ => None,
        }
    }
}

enum ParentCheck {
    Ok,
    NotBuilt,
    Blocked,
}

#[derive(Debug)]
pub struct Scheduler {
    layers: BuildLayers,
    settings: SchedulerSettings,
    edition: Edition,
    job_layer: Vec<usize>,
    finished: HashSet<usize>,
    /// Jobs set to `ParentError`. Terminal, but never counted as finished.
    blocked: HashSet<usize>,
    /// First layer that still has a non-terminal job.
    cursor: usize,
    has_errors: bool,
    was_aborted: bool,
    slots: DispatchSlots,
    started: Instant,
    dispatched_at: Vec<Option<Instant>>,
    run_times: Vec<Option<Duration>>,
}

impl Scheduler {
    /// Fails if `layers` holds a cycle instead of layers.
    pub fn new(layers: BuildLayers, settings: SchedulerSettings) -> Result<Self> {
        layers.ensure_acyclic()?;

        let total = layers.len();
        let mut job_layer = vec![0; total];
        for (n, layer) in layers.layers().iter().enumerate() {
            for &idx in layer {
                job_layer[idx] = n;
            }
        }

        Ok(Self {
            layers,
            settings,
            edition: Edition::default(),
            job_layer,
            finished: HashSet::with_capacity(total),
            blocked: HashSet::new(),
            cursor: 0,
            has_errors: false,
            was_aborted: false,
            slots: DispatchSlots::new(1),
            started: Instant::now(),
            dispatched_at: vec![None; total],
            run_times: vec![None; total],
        })
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    /// Number of executions allowed in flight at once (at least one).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.slots = DispatchSlots::new(capacity);
        self
    }

    /// Only build `start` and everything downstream of it. All other jobs are
    /// marked `NoBuild`. An empty list keeps the full build.
    pub fn with_partial_build<S: AsRef<str>>(mut self, start: &[S]) -> Result<Self> {
        let mut roots = Vec::with_capacity(start.len());
        for id in start {
            let id = id.as_ref();
            let idx = self.layers.index_of(id).ok_or_else(|| {
                BuildGraphError::JobNotFound(format!(
                    "can't start the partial build, '{id}' is not part of the build graph"
                ))
            })?;
            roots.push(idx);
        }
        if roots.is_empty() {
            return Ok(self);
        }

        for idx in 0..self.layers.len() {
            self.layers.set_status(idx, BuildStatus::NoBuild);
            self.finished.insert(idx);
        }

        let mut stack = roots;
        while let Some(idx) = stack.pop() {
            if self.layers.status(idx) == BuildStatus::None {
                continue;
            }
            self.layers.set_status(idx, BuildStatus::None);
            self.finished.remove(&idx);
            stack.extend(self.layers.job(idx).children.iter().copied());
        }

        info!(
            start = ?start.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
            selected = self.layers.len() - self.finished.len(),
            skipped = self.finished.len(),
            "partial build selected"
        );
        self.advance_cursor();
        Ok(self)
    }

    /// `false` once the build was aborted or every job finished.
    pub fn has_next(&self) -> bool {
        !self.was_aborted && self.finished.len() < self.layers.len()
    }

    /// Next scheduling decision, applying throttles for the local time.
    pub fn get_next(&mut self) -> Scheduled {
        self.get_next_at(Local::now().time())
    }

    /// Next scheduling decision as if the local time were `time`.
    pub fn get_next_at(&mut self, time: NaiveTime) -> Scheduled {
        if self.was_aborted {
            return Scheduled::Abort;
        }
        if self.slots.len() >= self.effective_capacity(time) {
            return Scheduled::Wait;
        }
        if self.finished.len() == self.layers.len() {
            return Scheduled::Finished;
        }

        self.advance_cursor();
        let mut progress_possible = false;
        for layer in self.cursor..self.layers.layers().len() {
            for pos in 0..self.layers.layers()[layer].len() {
                let idx = self.layers.layers()[layer][pos];
                match self.layers.status(idx) {
                    BuildStatus::None => match self.check_parents(idx) {
                        ParentCheck::Ok => return Scheduled::Job(self.start(idx)),
                        ParentCheck::NotBuilt => progress_possible = true,
                        ParentCheck::Blocked => self.block(idx),
                    },
                    BuildStatus::InProgress => progress_possible = true,
                    _ => {}
                }
            }
        }

        if progress_possible || self.blocked.is_empty() {
            Scheduled::Wait
        } else {
            debug!(
                blocked = self.blocked.len(),
                "every remaining job is blocked by a failed parent"
            );
            Scheduled::Abort
        }
    }

    /// Record the final status of an in-progress job.
    ///
    /// Only `Success`, `Error`, `Abort` and `NoBuild` are accepted.
    pub fn finish_build(&mut self, id: &str, status: BuildStatus) -> Result<()> {
        let idx = self.index(id)?;
        self.finish(idx, status)
    }

    pub fn success_build(&mut self, id: &str) -> Result<()> {
        self.finish_build(id, BuildStatus::Success)
    }

    pub fn error_build(&mut self, id: &str) -> Result<()> {
        self.finish_build(id, BuildStatus::Error)
    }

    pub fn abort_build(&mut self, id: &str) -> Result<()> {
        self.finish_build(id, BuildStatus::Abort)
    }

    /// Occupy a dispatch slot with the execution of `job`.
    pub fn register(&mut self, job: &ScheduledJob, handle: ExecutionHandle) -> Result<()> {
        let idx = self.index(&job.id)?;
        let status = self.layers.status(idx);
        if status != BuildStatus::InProgress {
            return Err(BuildGraphError::Scheduler(format!(
                "can't register job '{}' with status {status}",
                job.id
            )));
        }
        if self.slots.contains(idx) {
            return Err(BuildGraphError::Scheduler(format!(
                "job '{}' is already dispatched",
                job.id
            )));
        }
        if self.slots.len() >= self.slots.capacity() {
            let running: Vec<&str> = self
                .slots
                .iter()
                .map(|d| self.layers.job(d.job).id.as_str())
                .collect();
            return Err(BuildGraphError::Scheduler(format!(
                "can't dispatch '{}' while {running:?} occupy every slot",
                job.id
            )));
        }

        let started = self.dispatched_at[idx].unwrap_or_else(Instant::now);
        // Whatever is left of the whole build caps the job's own limit.
        let build_left = self
            .settings
            .max_duration
            .saturating_sub(started.saturating_duration_since(self.started));
        let budget = self.budget_of(idx).min(build_left);
        info!(
            job = %job.id,
            reference = handle.reference().unwrap_or("-"),
            budget = %format_duration(budget),
            "job dispatched"
        );
        self.slots.insert(Dispatch {
            job: idx,
            handle,
            started,
            budget,
        })
    }

    /// Collect finished executions and abort those out of time.
    ///
    /// Tries without blocking first. If nothing could be ejected, waits until
    /// any execution resolves or the smallest remaining budget runs out.
    /// Returns the number of jobs that reached a final status.
    pub async fn eject_finished_builds(&mut self) -> Result<usize> {
        if self.slots.is_empty() {
            return Ok(0);
        }

        let ejected = self.eject_ready(Instant::now())?;
        if ejected > 0 {
            return Ok(ejected);
        }

        let Some(wait) = self.slots.min_remaining(Instant::now()) else {
            return Ok(0);
        };
        if tokio::time::timeout(wait, self.slots.any_resolved())
            .await
            .is_err()
        {
            debug!(waited = %format_duration(wait), "no execution finished in time");
        }
        self.eject_ready(Instant::now())
    }

    /// Cancel every in-flight execution and abort the build.
    pub fn abort_all(&mut self) {
        for mut dispatch in self.slots.drain() {
            dispatch.handle.cancel();
        }
        for idx in 0..self.layers.len() {
            if self.layers.status(idx) == BuildStatus::InProgress {
                self.mark_finished(idx, BuildStatus::Abort);
            }
        }
        self.was_aborted = true;
        warn!("build aborted");
    }

    /// `true` once the whole build ran longer than its maxDuration.
    pub fn build_time_exceeded(&self) -> bool {
        self.started.elapsed() > self.settings.max_duration
    }

    pub fn has_build_errors(&self) -> bool {
        self.has_errors
    }

    pub fn was_aborted(&self) -> bool {
        self.was_aborted
    }

    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn status(&self, id: &str) -> Option<BuildStatus> {
        self.layers.index_of(id).map(|idx| self.layers.status(idx))
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> BuildSnapshot {
        let jobs = self
            .layers
            .layers()
            .iter()
            .flatten()
            .map(|&idx| {
                let job = self.layers.job(idx);
                JobSnapshot {
                    id: job.id.clone(),
                    layer: self.job_layer[idx],
                    status: job.status,
                    run_time: self.run_times[idx],
                    in_flight: self.slots.contains(idx),
                }
            })
            .collect();

        BuildSnapshot {
            jobs,
            total: self.layers.len(),
            finished: self.finished.len(),
            in_flight: self.slots.len(),
            has_errors: self.has_errors,
            was_aborted: self.was_aborted,
            elapsed: self.started.elapsed(),
        }
    }

    fn effective_capacity(&self, time: NaiveTime) -> usize {
        let capacity = self.slots.capacity();
        if !self.edition.supports_throttling() {
            return capacity;
        }
        match self.settings.allowed_executors(time) {
            Some(limit) => capacity.min(limit),
            None => capacity,
        }
    }

    fn check_parents(&self, idx: usize) -> ParentCheck {
        let job = self.layers.job(idx);
        let parents = self.layers.parents(idx);

        if job.settings.on_parent_failure == ParentFailureMode::Abort
            && parents.iter().any(|&p| self.layers.status(p).is_failure())
        {
            return ParentCheck::Blocked;
        }
        if parents.iter().any(|&p| !self.layers.status(p).is_terminal()) {
            return ParentCheck::NotBuilt;
        }
        ParentCheck::Ok
    }

    fn start(&mut self, idx: usize) -> ScheduledJob {
        self.layers.set_status(idx, BuildStatus::InProgress);
        self.dispatched_at[idx] = Some(Instant::now());

        let job = self.layers.job(idx);
        debug!(job = %job.id, layer = self.job_layer[idx], "job scheduled");
        ScheduledJob {
            id: job.id.clone(),
            agents: job.settings.agents.clone(),
            max_duration: self.budget_of(idx),
            weight: job.settings.weight,
        }
    }

    fn block(&mut self, idx: usize) {
        self.layers.set_status(idx, BuildStatus::ParentError);
        self.blocked.insert(idx);
        self.has_errors = true;
        warn!(job = %self.layers.job(idx).id, "parent build failed; job will not be built");
    }

    fn budget_of(&self, idx: usize) -> Duration {
        self.layers
            .job(idx)
            .settings
            .max_duration
            .min(self.settings.max_duration)
    }

    fn index(&self, id: &str) -> Result<usize> {
        self.layers
            .index_of(id)
            .ok_or_else(|| BuildGraphError::JobNotFound(id.to_string()))
    }

    fn finish(&mut self, idx: usize, status: BuildStatus) -> Result<()> {
        let id = &self.layers.job(idx).id;
        if !matches!(
            status,
            BuildStatus::Success | BuildStatus::Error | BuildStatus::Abort | BuildStatus::NoBuild
        ) {
            return Err(BuildGraphError::Scheduler(format!(
                "job '{id}' can't be finished with status {status}"
            )));
        }
        let current = self.layers.status(idx);
        if current != BuildStatus::InProgress {
            return Err(BuildGraphError::Scheduler(format!(
                "job '{id}' can't be finished with status {status}, it is {current}"
            )));
        }

        self.slots.remove(idx);
        self.mark_finished(idx, status);
        Ok(())
    }

    fn mark_finished(&mut self, idx: usize, status: BuildStatus) {
        self.layers.set_status(idx, status);
        self.finished.insert(idx);
        match status {
            BuildStatus::Error => self.has_errors = true,
            BuildStatus::Abort => self.was_aborted = true,
            _ => {}
        }

        let run_time = self.dispatched_at[idx].map(|at| at.elapsed());
        self.run_times[idx] = run_time;
        info!(
            job = %self.layers.job(idx).id,
            status = %status,
            run_time = %format_duration(run_time.unwrap_or_default()),
            "job finished"
        );
        self.advance_cursor();
    }

    fn eject_ready(&mut self, now: Instant) -> Result<usize> {
        let mut ejected = 0;

        for mut dispatch in self.slots.take_exhausted(now) {
            dispatch.handle.cancel();
            warn!(
                job = %self.layers.job(dispatch.job).id,
                reference = dispatch.handle.reference().unwrap_or("-"),
                max_build_time = %format_duration(dispatch.budget),
                "max build time exceeded; aborting"
            );
            self.finish(dispatch.job, BuildStatus::Abort)?;
            ejected += 1;
        }

        for (dispatch, state) in self.slots.take_resolved() {
            let status = match state {
                HandleState::Finished(ExecutionOutcome::Success) => BuildStatus::Success,
                HandleState::Finished(ExecutionOutcome::Failure) => BuildStatus::Error,
                HandleState::Finished(ExecutionOutcome::Cancelled) => BuildStatus::Abort,
                HandleState::Lost => {
                    warn!(
                        job = %self.layers.job(dispatch.job).id,
                        "execution ended without a result"
                    );
                    BuildStatus::Error
                }
                HandleState::Pending => continue,
            };
            self.finish(dispatch.job, status)?;
            ejected += 1;
        }

        Ok(ejected)
    }

    fn advance_cursor(&mut self) {
        let layers = self.layers.layers();
        while self.cursor < layers.len()
            && layers[self.cursor]
                .iter()
                .all(|&idx| self.layers.status(idx).is_terminal())
        {
            self.cursor += 1;
        }
    }
}
