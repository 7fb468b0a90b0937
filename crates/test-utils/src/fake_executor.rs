use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildgraph::dag::ScheduledJob;
use buildgraph::errors::{BuildGraphError, Result};
use buildgraph::exec::{ExecutionHandle, ExecutionOutcome, Executor};

/// What the fake does with a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    Succeed,
    Fail,
    /// Report `Cancelled` without being asked to.
    Cancel,
    /// Refuse the submission.
    Refuse,
    /// Never finish on its own; reports `Cancelled` once cancelled.
    Hang,
    /// Drop the reporter without a result.
    Vanish,
}

#[derive(Debug, Clone, Copy)]
struct Script {
    behaviour: FakeBehaviour,
    delay: Duration,
}

/// A fake executor that:
/// - records which jobs were submitted, in order
/// - resolves each handle with a scripted outcome, optionally after a delay.
///
/// Jobs without a script succeed immediately.
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    scripts: HashMap<String, Script>,
    fallback: Script,
}

impl FakeExecutor {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            executed,
            scripts: HashMap::new(),
            fallback: Script {
                behaviour: FakeBehaviour::Succeed,
                delay: Duration::ZERO,
            },
        }
    }

    /// Behaviour and delay for jobs without a script.
    pub fn with_fallback(mut self, behaviour: FakeBehaviour, delay: Duration) -> Self {
        self.fallback = Script { behaviour, delay };
        self
    }

    pub fn script(self, id: &str, behaviour: FakeBehaviour) -> Self {
        self.script_after(id, behaviour, Duration::ZERO)
    }

    pub fn script_after(mut self, id: &str, behaviour: FakeBehaviour, delay: Duration) -> Self {
        self.scripts
            .insert(id.to_string(), Script { behaviour, delay });
        self
    }
}

impl Executor for FakeExecutor {
    fn submit(
        &mut self,
        job: &ScheduledJob,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionHandle>> + Send + '_>> {
        let id = job.id.clone();
        let script = self.scripts.get(&id).copied().unwrap_or(self.fallback);
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            executed.lock().unwrap().push(id.clone());

            let outcome = match script.behaviour {
                FakeBehaviour::Refuse => {
                    return Err(BuildGraphError::ConfigError(format!(
                        "fake executor refused '{id}'"
                    )));
                }
                FakeBehaviour::Succeed => Some(ExecutionOutcome::Success),
                FakeBehaviour::Fail => Some(ExecutionOutcome::Failure),
                FakeBehaviour::Cancel => Some(ExecutionOutcome::Cancelled),
                FakeBehaviour::Hang | FakeBehaviour::Vanish => None,
            };

            let (handle, mut reporter) = ExecutionHandle::channel();
            let vanish = script.behaviour == FakeBehaviour::Vanish;
            tokio::spawn(async move {
                let finished = async {
                    tokio::time::sleep(script.delay).await;
                    match outcome {
                        Some(outcome) => Some(outcome),
                        None if vanish => None,
                        None => std::future::pending().await,
                    }
                };
                let report = tokio::select! {
                    outcome = finished => outcome,
                    requested = reporter.cancelled() => {
                        requested.then_some(ExecutionOutcome::Cancelled)
                    }
                };
                if let Some(outcome) = report {
                    reporter.report(outcome);
                }
            });

            Ok(handle.with_reference(format!("fake {id}")))
        })
    }
}
