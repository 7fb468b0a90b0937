// src/config/model.rs

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::dsl::SettingsVerifier;
use crate::errors::{BuildGraphError, Result};
use crate::exec::JobCommand;
use crate::types::Edition;

/// Configuration exactly as decoded from TOML, before validation.
///
/// ```toml
/// [config]
/// edition = "pro"
/// max_parallel = 2
/// agents = ["linux"]
///
/// [pipeline]
/// script = "A -> B"
///
/// [job.A]
/// cmd = "make a"
/// agents = ["linux"]
/// ```
///
/// All sections are optional for decoding; [`ConfigFile::try_from`] decides
/// what is actually required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Keys are the job ids used in the pipeline.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub pipeline: PipelineSection,
    pub job: BTreeMap<String, JobConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Reject unknown settings fields in the pipeline.
    #[serde(default)]
    pub strict_mode: bool,

    /// Check job ids and agents against this file. When off, anything goes.
    #[serde(default = "default_verify")]
    pub verify: bool,

    #[serde(default)]
    pub edition: Edition,

    /// Executions allowed in flight at once.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Idle sleep between scheduling rounds when nothing finished.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Agents known to this host besides those listed per job.
    #[serde(default)]
    pub agents: Vec<String>,
}

fn default_verify() -> bool {
    true
}

fn default_max_parallel() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            strict_mode: false,
            verify: default_verify(),
            edition: Edition::default(),
            max_parallel: default_max_parallel(),
            poll_interval_ms: default_poll_interval_ms(),
            agents: Vec::new(),
        }
    }
}

/// `[pipeline]` section: the DSL text, inline or in a file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineSection {
    #[serde(default)]
    pub script: Option<String>,

    /// Relative paths are resolved against the config file's directory.
    #[serde(default)]
    pub file: Option<String>,
}

/// `[job.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Shell command that builds the job.
    pub cmd: String,

    /// Agents this job's executor provides. Empty: no restriction.
    #[serde(default)]
    pub agents: Vec<String>,
}

impl ConfigFile {
    /// Build a `ConfigFile` without validation. Used by `TryFrom`.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        pipeline: PipelineSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self {
            config,
            pipeline,
            job,
        }
    }

    /// The pipeline DSL text, reading `pipeline.file` relative to `config_dir`.
    pub fn pipeline_source(&self, config_dir: &Path) -> Result<String> {
        match (&self.pipeline.script, &self.pipeline.file) {
            (Some(script), None) => Ok(script.clone()),
            (None, Some(file)) => {
                let path = config_dir.join(file);
                std::fs::read_to_string(&path).map_err(|e| {
                    BuildGraphError::ConfigError(format!(
                        "can't read pipeline file '{}': {e}",
                        path.display()
                    ))
                })
            }
            _ => Err(BuildGraphError::ConfigError(
                "[pipeline] needs exactly one of `script` or `file`".to_string(),
            )),
        }
    }

    /// Verifier that knows the configured jobs and agents.
    pub fn verifier(&self) -> SettingsVerifier {
        let agents = self
            .config
            .agents
            .iter()
            .chain(self.job.values().flat_map(|job| job.agents.iter()))
            .cloned();

        SettingsVerifier::new(self.job.keys().cloned(), agents)
            .with_strict_mode(self.config.strict_mode)
            .with_verification(self.config.verify)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    /// Commands for the shell executor, keyed by job id.
    pub fn job_commands(&self) -> HashMap<String, JobCommand> {
        self.job
            .iter()
            .map(|(id, job)| {
                (
                    id.clone(),
                    JobCommand::new(job.cmd.clone()).with_agents(job.agents.iter().cloned()),
                )
            })
            .collect()
    }
}
