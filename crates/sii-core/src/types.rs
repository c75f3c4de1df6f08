//! Records returned by a lookup and the metrics attached to them.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Earliest year the upstream activity table uses as a section header.
///
/// Codes in `(FIRST_HEADER_YEAR, current_year]` are calendar-year header rows,
/// not economic-activity codes.
pub const FIRST_HEADER_YEAR: i64 = 1970;

/// A coded economic-activity classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity code as printed upstream (e.g. `829900`)
    pub code: String,
    /// Activity description, empty when the upstream row omits it
    #[serde(default)]
    pub name: String,
}

impl Activity {
    /// Create an activity with a code and no description.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether `code` is really a calendar-year header row.
    ///
    /// Only codes that parse as an integer in `(1970, current_year]` qualify.
    #[must_use]
    pub fn is_year_header(code: &str, current_year: i32) -> bool {
        code.trim()
            .parse::<i64>()
            .is_ok_and(|n| n > FIRST_HEADER_YEAR && n <= i64::from(current_year))
    }
}

/// Taxpayer record resolved by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    /// Canonical identifier (`<body>-<CHECK>`)
    pub rut: String,
    /// Registered name (razón social)
    pub name: String,
    /// Economic activities, in upstream order
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// Request accounting for one lookup call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// Network calls issued by the client so far, captcha fetches included
    pub total_request_count: u64,
    /// Mean wall-clock duration of the attempts in this call
    pub average_attempt_latency: Duration,
    /// Attempts consumed in this call
    pub attempts_used: u32,
}

impl RequestMetrics {
    /// Build metrics from per-attempt latencies.
    ///
    /// Failed attempts count towards the average like successful ones.
    #[must_use]
    pub fn from_attempts(total_request_count: u64, latencies: &[Duration]) -> Self {
        let attempts_used = u32::try_from(latencies.len()).unwrap_or(u32::MAX);
        let average_attempt_latency = if attempts_used == 0 {
            Duration::ZERO
        } else {
            latencies.iter().sum::<Duration>() / attempts_used
        };

        Self {
            total_request_count,
            average_attempt_latency,
            attempts_used,
        }
    }
}

/// Current calendar year in local time.
#[must_use]
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
