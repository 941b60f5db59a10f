//! Clock-style rendering of playback times

use serde::{Deserialize, Serialize};

/// How much of the clock to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeDisplay {
    /// `HH:MM:SS`
    Hour,
    /// `MM:SS` (minute of the hour)
    Minutes,
    /// `SS` (second of the minute)
    Seconds,
}

impl TimeDisplay {
    pub fn format(self, seconds: f64) -> String {
        format_duration(seconds, self)
    }
}

impl std::str::FromStr for TimeDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" | "hours" | "h" => Ok(TimeDisplay::Hour),
            "minutes" | "minute" | "m" => Ok(TimeDisplay::Minutes),
            "seconds" | "second" | "s" => Ok(TimeDisplay::Seconds),
            other => Err(format!("unknown time display '{}'", other)),
        }
    }
}

/// Format `seconds` as a zero-padded clock string.
///
/// The value is truncated to whole seconds first. Negative input is not
/// clamped.
pub fn format_duration(seconds: f64, display: TimeDisplay) -> String {
    let t = seconds as i64;
    let h = t / 60 / 60;
    let m = t / 60 % 60;
    let s = t % 60;

    match display {
        TimeDisplay::Hour => format!("{:02}:{:02}:{:02}", h, m, s),
        TimeDisplay::Minutes => format!("{:02}:{:02}", m, s),
        TimeDisplay::Seconds => format!("{:02}", s),
    }
}
