//! Wall-clock access, injectable for tests.

#[cfg(test)]
use std::cell::Cell;

use chrono::{DateTime, Local};
#[cfg(test)]
use chrono::{Duration, TimeZone};

pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    millis: Cell<i64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            millis: Cell::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: DateTime<Local>) {
        self.millis.set(at.timestamp_millis());
    }

    pub fn advance(&self, by: Duration) {
        self.millis.set(self.millis.get() + by.num_milliseconds());
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        Local
            .timestamp_millis_opt(self.millis.get())
            .single()
            .unwrap_or_else(Local::now)
    }

    fn now_millis(&self) -> i64 {
        self.millis.get()
    }
}

/// Whole seconds between two epoch-millisecond instants, floored at zero
/// when the clock moved backwards.
pub fn elapsed_secs(from_millis: i64, to_millis: i64) -> u64 {
    (to_millis - from_millis).max(0) as u64 / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance_secs(90);
        assert_eq!(clock.now() - start, Duration::seconds(90));
    }

    #[test]
    fn elapsed_is_floored_at_zero() {
        assert_eq!(elapsed_secs(10_000, 4_000), 0);
        assert_eq!(elapsed_secs(1_000, 4_999), 3);
    }
}
