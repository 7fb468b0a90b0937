// src/dag/dispatch.rs

//! Bounded set of in-flight executions, keyed by job.

use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::{BuildGraphError, Result};
use crate::exec::{ExecutionHandle, HandleState};

/// One outstanding execution.
#[derive(Debug)]
pub struct Dispatch {
    pub job: usize,
    pub handle: ExecutionHandle,
    pub started: Instant,
    /// Time the job may run, measured from `started`.
    pub budget: Duration,
}

impl Dispatch {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.budget.saturating_sub(now.saturating_duration_since(self.started))
    }

    pub fn is_exhausted(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }
}

#[derive(Debug)]
pub struct DispatchSlots {
    capacity: usize,
    slots: Vec<Dispatch>,
}

impl DispatchSlots {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, job: usize) -> bool {
        self.slots.iter().any(|d| d.job == job)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dispatch> {
        self.slots.iter()
    }

    /// Occupy a slot. Errors if all slots are taken or `job` already has one.
    pub fn insert(&mut self, dispatch: Dispatch) -> Result<()> {
        if self.contains(dispatch.job) {
            return Err(BuildGraphError::Scheduler(format!(
                "job #{} is already dispatched",
                dispatch.job
            )));
        }
        if self.slots.len() >= self.capacity {
            return Err(BuildGraphError::Scheduler(format!(
                "all {} dispatch slot(s) are taken",
                self.capacity
            )));
        }
        self.slots.push(dispatch);
        Ok(())
    }

    pub fn remove(&mut self, job: usize) -> Option<Dispatch> {
        let pos = self.slots.iter().position(|d| d.job == job)?;
        Some(self.slots.remove(pos))
    }

    pub fn drain(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.slots)
    }

    /// Remove every dispatch whose budget is used up.
    pub fn take_exhausted(&mut self, now: Instant) -> Vec<Dispatch> {
        let mut taken = Vec::new();
        let mut idx = 0;
        while idx < self.slots.len() {
            if self.slots[idx].is_exhausted(now) {
                taken.push(self.slots.remove(idx));
            } else {
                idx += 1;
            }
        }
        taken
    }

    /// Remove every dispatch whose handle already has a result.
    pub fn take_resolved(&mut self) -> Vec<(Dispatch, HandleState)> {
        let mut resolved = Vec::new();
        let mut idx = 0;
        while idx < self.slots.len() {
            match self.slots[idx].handle.try_outcome() {
                HandleState::Pending => idx += 1,
                state => resolved.push((self.slots.remove(idx), state)),
            }
        }
        resolved
    }

    /// Smallest remaining budget across all dispatches.
    pub fn min_remaining(&self, now: Instant) -> Option<Duration> {
        self.slots.iter().map(|d| d.remaining(now)).min()
    }

    /// Resolves as soon as any handle has a result. Pending forever when
    /// there are no dispatches, so callers bound it with a timeout.
    pub async fn any_resolved(&mut self) {
        poll_fn(|cx| {
            let mut ready = false;
            for dispatch in &mut self.slots {
                if dispatch.handle.poll_outcome(cx).is_ready() {
                    ready = true;
                }
            }
            if ready { Poll::Ready(()) } else { Poll::Pending }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecutionOutcome;

    fn dispatch(job: usize, budget_secs: u64) -> (Dispatch, crate::exec::ExecutionReporter) {
        let (handle, reporter) = ExecutionHandle::channel();
        (
            Dispatch {
                job,
                handle,
                started: Instant::now(),
                budget: Duration::from_secs(budget_secs),
            },
            reporter,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_is_enforced() {
        let mut slots = DispatchSlots::new(1);
        let (first, _r1) = dispatch(0, 10);
        let (second, _r2) = dispatch(1, 10);
        slots.insert(first).unwrap();
        let err = slots.insert(second).unwrap_err();
        assert!(err.to_string().contains("dispatch slot"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn same_job_cannot_be_dispatched_twice() {
        let mut slots = DispatchSlots::new(4);
        let (first, _r1) = dispatch(3, 10);
        let (again, _r2) = dispatch(3, 10);
        slots.insert(first).unwrap();
        assert!(slots.insert(again).is_err());
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(DispatchSlots::new(0).capacity(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budgets_run_out() {
        let mut slots = DispatchSlots::new(2);
        let (short, _r1) = dispatch(0, 5);
        let (long, _r2) = dispatch(1, 60);
        slots.insert(short).unwrap();
        slots.insert(long).unwrap();

        assert_eq!(slots.min_remaining(Instant::now()), Some(Duration::from_secs(5)));
        tokio::time::advance(Duration::from_secs(6)).await;

        let exhausted = slots.take_exhausted(Instant::now());
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].job, 0);
        assert_eq!(slots.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_handles_are_taken() {
        let mut slots = DispatchSlots::new(2);
        let (a, ra) = dispatch(0, 60);
        let (b, _rb) = dispatch(1, 60);
        slots.insert(a).unwrap();
        slots.insert(b).unwrap();

        assert!(slots.take_resolved().is_empty());
        ra.report(ExecutionOutcome::Failure);
        slots.any_resolved().await;

        let resolved = slots.take_resolved();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].0.job, 0);
        assert_eq!(resolved[0].1, HandleState::Finished(ExecutionOutcome::Failure));
        assert!(slots.contains(1));
    }
}
