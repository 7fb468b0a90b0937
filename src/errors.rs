// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dsl::ParseError;

#[derive(Error, Debug)]
pub enum BuildGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Pipeline parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Build cycle detected: {0}")]
    BuildCycle(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Duplicate job: {0}")]
    DuplicateJob(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildGraphError>;
