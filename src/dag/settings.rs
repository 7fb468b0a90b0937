// src/dag/settings.rs

//! Per-job [`BuildSettings`] and whole-build [`SchedulerSettings`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Serialize;

use crate::time::{DEFAULT_BUILD_DURATION, DEFAULT_MAX_BUILD_TIME};

/// Agent name every verifier knows about; it matches any executor.
pub const ANY_AGENT: &str = "any";

/// Execution capability a job may be restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuildAgent(String);

impl BuildAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        self.0 == ANY_AGENT
    }
}

impl fmt::Display for BuildAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do with a job when one of its parents did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ParentFailureMode {
    /// Build anyway once every parent reached a terminal state.
    Build,
    /// Skip the job (it ends up as `PARENT_ERROR`).
    #[default]
    Abort,
}

impl FromStr for ParentFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUILD" => Ok(ParentFailureMode::Build),
            "ABORT" => Ok(ParentFailureMode::Abort),
            other => Err(format!(
                "expected modes: [BUILD, ABORT], got: '{other}'"
            )),
        }
    }
}

impl fmt::Display for ParentFailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentFailureMode::Build => f.write_str("BUILD"),
            ParentFailureMode::Abort => f.write_str("ABORT"),
        }
    }
}

/// Raw value of a settings field the parser does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SettingValue {
    Scalar(String),
    List(Vec<String>),
}

/// Unrecognised settings field kept around for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownSetting {
    pub field: String,
    pub value: SettingValue,
    /// Line on which the value ended.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    /// Allowed agents in declaration order, without duplicates. Empty means
    /// "no constraint".
    pub agents: Vec<BuildAgent>,
    pub on_parent_failure: ParentFailureMode,
    pub max_duration: Duration,
    /// Informational only.
    pub weight: u32,
    pub unknown: Vec<UnknownSetting>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            on_parent_failure: ParentFailureMode::Abort,
            max_duration: DEFAULT_BUILD_DURATION,
            weight: 1,
            unknown: Vec::new(),
        }
    }
}

impl BuildSettings {
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(BuildAgent::name).collect()
    }
}

/// Concurrency limit that applies from `start` until the next window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Throttle {
    pub start: NaiveTime,
    pub executors: usize,
}

impl Throttle {
    pub fn new(start: NaiveTime, executors: usize) -> Self {
        Self { start, executors }
    }
}

/// Settings of the whole build (`_BUILD { ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSettings {
    pub max_duration: Duration,
    throttles: Vec<Throttle>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_BUILD_TIME,
            throttles: Vec::new(),
        }
    }
}

impl SchedulerSettings {
    pub fn throttles(&self) -> &[Throttle] {
        &self.throttles
    }

    /// Add throttle windows, keeping the list ordered by start time.
    pub fn add_throttles(&mut self, throttles: impl IntoIterator<Item = Throttle>) {
        self.throttles.extend(throttles);
        self.throttles.sort_by_key(|t| t.start);
    }

    /// Executors allowed at `time`, or `None` when unrestricted.
    ///
    /// The last window starting at or before `time` wins. Before the first
    /// window of the day there is no restriction.
    pub fn allowed_executors(&self, time: NaiveTime) -> Option<usize> {
        self.throttles
            .iter()
            .take_while(|t| t.start <= time)
            .last()
            .map(|t| t.executors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn throttled() -> SchedulerSettings {
        let mut settings = SchedulerSettings::default();
        settings.add_throttles([
            Throttle::new(at(10, 0, 0), 5),
            Throttle::new(at(20, 0, 0), 10),
            Throttle::new(at(15, 0, 0), 2),
        ]);
        settings
    }

    #[test]
    fn throttles_are_sorted() {
        let starts: Vec<_> = throttled().throttles().iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![at(10, 0, 0), at(15, 0, 0), at(20, 0, 0)]);
    }

    #[test]
    fn no_restriction_before_first_window() {
        let settings = throttled();
        assert_eq!(settings.allowed_executors(at(0, 0, 0)), None);
        assert_eq!(settings.allowed_executors(at(9, 59, 59)), None);
    }

    #[test]
    fn window_applies_from_its_start() {
        let settings = throttled();
        assert_eq!(settings.allowed_executors(at(10, 0, 0)), Some(5));
        assert_eq!(settings.allowed_executors(at(12, 12, 15)), Some(5));
        assert_eq!(settings.allowed_executors(at(15, 0, 10)), Some(2));
        assert_eq!(settings.allowed_executors(at(23, 59, 0)), Some(10));
    }

    #[test]
    fn empty_throttle_list_is_unrestricted() {
        assert_eq!(SchedulerSettings::default().allowed_executors(at(12, 0, 0)), None);
    }

    #[test]
    fn parent_failure_mode_is_case_sensitive() {
        assert_eq!("BUILD".parse(), Ok(ParentFailureMode::Build));
        assert_eq!("ABORT".parse(), Ok(ParentFailureMode::Abort));
        assert!("build".parse::<ParentFailureMode>().is_err());
        assert_eq!(ParentFailureMode::default(), ParentFailureMode::Abort);
    }
}
