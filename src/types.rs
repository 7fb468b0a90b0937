// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Product edition the pipeline is parsed and scheduled for.
///
/// - `Community`: `buildThrottle` is accepted by the parser but ignored.
/// - `Pro`: throttle windows are parsed and limit how many jobs may be
///   dispatched at a given time of day.
///
/// The value is handed explicitly to the parser and the scheduler; there is
/// no process-wide edition switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    #[default]
    Community,
    Pro,
}

impl Edition {
    pub fn supports_throttling(self) -> bool {
        matches!(self, Edition::Pro)
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "community" => Ok(Edition::Community),
            "pro" => Ok(Edition::Pro),
            other => Err(format!(
                "invalid edition: {other} (expected \"community\" or \"pro\")"
            )),
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Community => f.write_str("community"),
            Edition::Pro => f.write_str("pro"),
        }
    }
}
