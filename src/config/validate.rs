// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildGraphError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildGraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.pipeline, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_global_config(cfg)?;
    validate_pipeline(cfg)?;
    validate_jobs(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(BuildGraphError::ConfigError(
            "config must contain at least one [job.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    // edition is validated during deserialization.

    if cfg.config.max_parallel == 0 {
        return Err(BuildGraphError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.poll_interval_ms == 0 {
        return Err(BuildGraphError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(agent) = cfg.config.agents.iter().find(|a| a.trim().is_empty()) {
        return Err(BuildGraphError::ConfigError(format!(
            "[config].agents contains an empty agent name: {agent:?}"
        )));
    }
    Ok(())
}

fn validate_pipeline(cfg: &RawConfigFile) -> Result<()> {
    match (&cfg.pipeline.script, &cfg.pipeline.file) {
        (Some(_), None) => Ok(()),
        (None, Some(file)) if !file.trim().is_empty() => Ok(()),
        (None, Some(_)) => Err(BuildGraphError::ConfigError(
            "[pipeline].file must not be empty".to_string(),
        )),
        (Some(_), Some(_)) => Err(BuildGraphError::ConfigError(
            "[pipeline] accepts either `script` or `file`, not both".to_string(),
        )),
        (None, None) => Err(BuildGraphError::ConfigError(
            "[pipeline] needs a `script` or a `file`".to_string(),
        )),
    }
}

fn validate_jobs(cfg: &RawConfigFile) -> Result<()> {
    for (id, job) in cfg.job.iter() {
        if job.cmd.trim().is_empty() {
            return Err(BuildGraphError::ConfigError(format!(
                "job '{id}' has an empty `cmd`"
            )));
        }
        if job.agents.iter().any(|a| a.trim().is_empty()) {
            return Err(BuildGraphError::ConfigError(format!(
                "job '{id}' lists an empty agent name"
            )));
        }
    }
    Ok(())
}
