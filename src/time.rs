//! Time points used to stamp measurements.
//!
//! A [`TimePoint`] is a non-negative offset from an arbitrary epoch shared by
//! all sensor streams of a filter. Differences are [`Duration`]s and are turned
//! into floating point seconds with [`to_sec`].

use crate::error::{GifError, GifResult};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// Instant on the filter's time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimePoint(Duration);

impl TimePoint {
    pub const EPOCH: TimePoint = TimePoint(Duration::ZERO);

    pub fn from_duration(since_epoch: Duration) -> Self {
        TimePoint(since_epoch)
    }

    /// Time point `secs` seconds after the epoch.
    ///
    /// Negative or non-finite inputs are rejected.
    pub fn from_secs_f64(secs: f64) -> GifResult<Self> {
        Duration::try_from_secs_f64(secs)
            .map(TimePoint)
            .map_err(|e| GifError::InvalidTimeInterval(format!("{secs} s: {e}")))
    }

    pub fn since_epoch(&self) -> Duration {
        self.0
    }

    /// Duration from `earlier` to `self`, `None` if `earlier` is later.
    pub fn checked_duration_since(&self, earlier: TimePoint) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }
}

/// Saturates at zero when `rhs` is later than `self`, like `std::time::Instant`.
impl Sub for TimePoint {
    type Output = Duration;

    fn sub(self, rhs: TimePoint) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for TimePoint {
    type Output = TimePoint;

    fn add(self, rhs: Duration) -> TimePoint {
        TimePoint(self.0 + rhs)
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0.as_secs_f64())
    }
}

/// Duration as floating point seconds.
pub fn to_sec(duration: Duration) -> f64 {
    duration.as_secs_f64()
}
