//! Clock abstraction for testable time handling.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Longest stretch of missing local time searched past midnight.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Source of the current wall-clock time, in seconds since the Unix epoch.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Fake clock for testing with controllable time
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    current: Arc<Mutex<f64>>,
}

impl FakeClock {
    pub fn at(timestamp: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(timestamp)),
        }
    }

    /// Advance the clock by `seconds`
    pub fn advance(&self, seconds: f64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += seconds;
    }

    pub fn set(&self, timestamp: f64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = timestamp;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> f64 {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Epoch seconds at which `date` starts in the local timezone.
pub fn local_midnight(date: NaiveDate) -> f64 {
    day_start_in(&Local, date)
}

/// Epoch seconds of the first instant of `date` that exists in `tz`.
///
/// This is midnight, unless a DST gap swallows it; then it is the end of
/// the gap.
pub(crate) fn day_start_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> f64 {
    let midnight = date.and_time(NaiveTime::default());
    (0..=MAX_GAP_MINUTES)
        .find_map(|minute| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .map(|start| start.timestamp())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight).timestamp()) as f64
}
