// src/exec/task_runner.rs

//! Shell executor: one child process per job.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledJob;
use crate::errors::{BuildGraphError, Result};
use crate::exec::backend::{ExecutionHandle, ExecutionOutcome, ExecutionReporter, Executor};

/// What the shell executor runs for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCommand {
    pub cmd: String,
    /// Agents the executor provides for this job. Empty means unrestricted.
    pub agents: Vec<String>,
}

impl JobCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            agents: Vec::new(),
        }
    }

    pub fn with_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents = agents.into_iter().map(Into::into).collect();
        self
    }
}

/// Runs every job's configured command through the platform shell.
#[derive(Debug, Default)]
pub struct ShellExecutor {
    commands: HashMap<String, JobCommand>,
    working_dir: Option<PathBuf>,
}

impl ShellExecutor {
    pub fn new(commands: HashMap<String, JobCommand>) -> Self {
        Self {
            commands,
            working_dir: None,
        }
    }

    /// Run the commands from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command_for(&self, job: &ScheduledJob) -> Result<&JobCommand> {
        let command = self
            .commands
            .get(&job.id)
            .filter(|c| !c.cmd.trim().is_empty())
            .ok_or_else(|| {
                BuildGraphError::ConfigError(format!("no command configured for job '{}'", job.id))
            })?;

        let unrestricted = job.agents.is_empty()
            || job.agents.iter().any(|a| a.is_any())
            || command.agents.is_empty();
        if !unrestricted
            && !job
                .agents
                .iter()
                .any(|a| command.agents.iter().any(|p| p == a.name()))
        {
            let wanted: Vec<&str> = job.agents.iter().map(|a| a.name()).collect();
            return Err(BuildGraphError::ConfigError(format!(
                "job '{}' needs one of the agents {wanted:?}, its executor provides {:?}",
                job.id, command.agents
            )));
        }
        Ok(command)
    }

    fn spawn(&self, job: &ScheduledJob, command: &JobCommand) -> Result<Child> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&command.cmd);
            c
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(job = %job.id, cmd = %command.cmd, "starting job process");
        let child = cmd.spawn().map_err(|e| {
            BuildGraphError::Other(anyhow::Error::new(e).context(format!(
                "spawning process for job '{}'",
                job.id
            )))
        })?;
        Ok(child)
    }
}

impl Executor for ShellExecutor {
    fn submit(
        &mut self,
        job: &ScheduledJob,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionHandle>> + Send + '_>> {
        let started = self
            .command_for(job)
            .and_then(|command| self.spawn(job, command))
            .map(|child| (job.id.clone(), child));

        Box::pin(async move {
            let (id, child) = started?;
            let (handle, reporter) = ExecutionHandle::channel();
            let handle = match child.id() {
                Some(pid) => handle.with_reference(format!("pid {pid}")),
                None => handle,
            };
            tokio::spawn(supervise(id, child, reporter));
            Ok(handle)
        })
    }
}

/// Wait for the child or a cancel request, then report the outcome.
async fn supervise(id: String, mut child: Child, mut reporter: ExecutionReporter) {
    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let job = id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = %job, "stderr: {}", line);
            }
        });
    }

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                info!(
                    job = %id,
                    exit_code = status.code().unwrap_or(-1),
                    success = status.success(),
                    "job process exited"
                );
                if status.success() {
                    ExecutionOutcome::Success
                } else {
                    ExecutionOutcome::Failure
                }
            }
            Err(e) => {
                error!(job = %id, error = %e, "waiting for job process failed");
                ExecutionOutcome::Failure
            }
        },

        requested = reporter.cancelled() => {
            if !requested {
                debug!(job = %id, "execution handle dropped; killing process");
                if let Err(e) = child.kill().await {
                    warn!(job = %id, error = %e, "failed to kill job process");
                }
                return;
            }
            info!(job = %id, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(job = %id, error = %e, "failed to kill job process on cancellation");
            }
            ExecutionOutcome::Cancelled
        }
    };

    if !reporter.report(outcome) {
        debug!(job = %id, %outcome, "nobody is waiting for the outcome");
    }
}
