//! Time source for window bounds and resource timestamps

use chrono::{SecondsFormat, Utc};

/// Source of "current time" formatted as ISO-8601.
///
/// All produced strings share one fixed-width format, so they compare
/// correctly as plain strings.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Wall clock in UTC with microsecond precision
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        now()
    }
}

/// Current UTC time, e.g. `2015-05-29T18:42:52.217499Z`
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
