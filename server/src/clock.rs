use chrono::{DateTime, Utc};

/// Source of "now" for request handling and housekeeping. The engine never
/// reads a clock itself; callers resolve the instant and pass it in.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
