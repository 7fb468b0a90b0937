// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The scheduler never runs work itself. The driving loop hands every
//! scheduled job to an [`Executor`], which returns an [`ExecutionHandle`]
//! that resolves once the job is done. Production code uses
//! [`ShellExecutor`](crate::exec::ShellExecutor); tests provide their own
//! implementation that doesn't spawn real processes.
//!
//! A handle and its [`ExecutionReporter`] are two ends of a pair of oneshot
//! channels: the reporter sends the outcome, the handle can send a cancel
//! request the other way. Dropping the reporter without reporting makes the
//! handle resolve to [`HandleState::Lost`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::oneshot;

use crate::dag::ScheduledJob;
use crate::errors::Result;

/// Result of one execution as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionOutcome {
    Success,
    Failure,
    Cancelled,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::Failure => "failure",
            ExecutionOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What a handle knows about its execution right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    Finished(ExecutionOutcome),
    /// The reporter went away without a result.
    Lost,
}

/// Trait abstracting how scheduled jobs are executed.
pub trait Executor: Send {
    /// Start executing `job`.
    ///
    /// An `Err` means the submission was refused; the job never started.
    fn submit(
        &mut self,
        job: &ScheduledJob,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionHandle>> + Send + '_>>;
}

/// Scheduler-side end of one execution.
#[derive(Debug)]
pub struct ExecutionHandle {
    outcome_rx: oneshot::Receiver<ExecutionOutcome>,
    cancel_tx: Option<oneshot::Sender<()>>,
    reference: Option<String>,
    resolved: Option<HandleState>,
}

/// Executor-side end of one execution.
#[derive(Debug)]
pub struct ExecutionReporter {
    outcome_tx: oneshot::Sender<ExecutionOutcome>,
    cancel_rx: oneshot::Receiver<()>,
}

impl ExecutionHandle {
    /// Create a connected handle/reporter pair.
    pub fn channel() -> (ExecutionHandle, ExecutionReporter) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        (
            ExecutionHandle {
                outcome_rx,
                cancel_tx: Some(cancel_tx),
                reference: None,
                resolved: None,
            },
            ExecutionReporter {
                outcome_tx,
                cancel_rx,
            },
        )
    }

    /// Attach a human readable reference (pid, URL, ...) used in logs.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Ask the executor to stop. Returns `false` if a cancel was already
    /// sent or the executor no longer listens.
    pub fn cancel(&mut self) -> bool {
        match self.cancel_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Non-blocking check for a result.
    pub fn try_outcome(&mut self) -> HandleState {
        if let Some(state) = self.resolved {
            return state;
        }
        let state = match self.outcome_rx.try_recv() {
            Ok(outcome) => HandleState::Finished(outcome),
            Err(oneshot::error::TryRecvError::Empty) => return HandleState::Pending,
            Err(oneshot::error::TryRecvError::Closed) => HandleState::Lost,
        };
        self.resolved = Some(state);
        state
    }

    /// Poll for a result, registering the waker while pending.
    pub fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<HandleState> {
        if let Some(state) = self.resolved {
            return Poll::Ready(state);
        }
        let state = match Pin::new(&mut self.outcome_rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => HandleState::Finished(outcome),
            Poll::Ready(Err(_)) => HandleState::Lost,
        };
        self.resolved = Some(state);
        Poll::Ready(state)
    }

    /// Wait for the result.
    pub async fn outcome(&mut self) -> HandleState {
        std::future::poll_fn(|cx| self.poll_outcome(cx)).await
    }
}

impl ExecutionReporter {
    /// Deliver the outcome. Returns `false` if the handle was dropped.
    pub fn report(self, outcome: ExecutionOutcome) -> bool {
        self.outcome_tx.send(outcome).is_ok()
    }

    /// Resolves when the handle asks for cancellation (`true`) or is
    /// dropped (`false`).
    pub async fn cancelled(&mut self) -> bool {
        (&mut self.cancel_rx).await.is_ok()
    }

    /// `true` once the handle can no longer receive a result.
    pub fn is_closed(&self) -> bool {
        self.outcome_tx.is_closed()
    }
}
