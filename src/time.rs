// src/time.rs

//! Duration and time-of-day literals used by pipeline settings.
//!
//! Durations are written as `mm` (total minutes), `hh:mm` or `hh:mm:ss`.
//! An empty literal means "no limit", represented by [`INFINITE_DURATION`]
//! so that it can take part in ordinary arithmetic and comparisons.

use std::time::Duration;

use chrono::NaiveTime;

/// Sentinel for "no limit" (10 000 days).
pub const INFINITE_DURATION: Duration = Duration::from_secs(10_000 * 24 * 60 * 60);

/// Per-job time limit when a pipeline does not specify one.
pub const DEFAULT_BUILD_DURATION: Duration = Duration::from_secs(2 * 60 * 60);

/// Whole-build time limit used when the pipeline asks for an unlimited build.
pub const DEFAULT_MAX_BUILD_TIME: Duration = Duration::from_secs(2 * 60 * 60);

/// Parse a duration literal.
///
/// Accepted forms:
/// - `""` -> [`INFINITE_DURATION`]
/// - `"90"` -> 90 minutes
/// - `"01:15"` -> 1 hour 15 minutes
/// - `"00:00:10"` -> 10 seconds
///
/// Minutes and seconds must lie in `[0, 59]` when hours are given.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    if input.is_empty() {
        return Ok(INFINITE_DURATION);
    }

    let parts: Vec<&str> = input.split(':').collect();
    match parts.as_slice() {
        [minutes] => {
            let minutes: u64 = minutes
                .parse()
                .map_err(|_| format!("'{input}' is not a valid duration (expected mm)"))?;
            Ok(Duration::from_secs(minutes * 60))
        }
        [hours, minutes] => {
            let (hours, minutes) = match (hours.parse::<u64>(), minutes.parse::<u64>()) {
                (Ok(h), Ok(m)) => (h, m),
                _ => return Err(format!("'{input}' is not a valid duration (expected hh:mm)")),
            };
            check_range(input, "minutes", minutes)?;
            Ok(Duration::from_secs(hours * 3600 + minutes * 60))
        }
        [hours, minutes, seconds] => {
            let (hours, minutes, seconds) =
                match (hours.parse::<u64>(), minutes.parse::<u64>(), seconds.parse::<u64>()) {
                    (Ok(h), Ok(m), Ok(s)) => (h, m, s),
                    _ => {
                        return Err(format!(
                            "'{input}' is not a valid duration (expected hh:mm:ss)"
                        ));
                    }
                };
            check_range(input, "minutes", minutes)?;
            check_range(input, "seconds", seconds)?;
            Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
        }
        _ => Err(format!("'{input}' is not a valid duration (expected hh:mm)")),
    }
}

fn check_range(input: &str, unit: &str, value: u64) -> Result<(), String> {
    if value > 59 {
        return Err(format!(
            "'{input}' is not a valid duration, expected {unit} range: [0, 59]"
        ));
    }
    Ok(())
}

/// Parse a `hh:mm` time of day (hours in `[0, 23]`, minutes in `[0, 59]`).
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, String> {
    let Some((hours, minutes)) = input.split_once(':') else {
        return Err(format!("'{input}' is not a valid time (expected hh:mm)"));
    };

    let (hours, minutes) = match (hours.parse::<u32>(), minutes.parse::<u32>()) {
        (Ok(h), Ok(m)) => (h, m),
        _ => return Err(format!("'{input}' is not a valid time (expected hh:mm)")),
    };
    if hours > 23 {
        return Err(format!(
            "'{input}' is not a valid time, expected hours range: [0, 23]"
        ));
    }
    if minutes > 59 {
        return Err(format!(
            "'{input}' is not a valid time, expected minutes range: [0, 59]"
        ));
    }

    NaiveTime::from_hms_opt(hours, minutes, 0)
        .ok_or_else(|| format!("'{input}' is not a valid time (expected hh:mm)"))
}

/// Human readable duration using the two coarsest units.
///
/// `1h:20m`, `9m:01s`, `12s`.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    if hours > 0 {
        let minutes = (total_secs % 3600) / 60;
        return format!("{hours}h:{minutes:02}m");
    }

    let minutes = total_secs / 60;
    if minutes > 0 {
        let seconds = total_secs % 60;
        return format!("{minutes}m:{seconds:02}s");
    }

    format!("{total_secs}s")
}
