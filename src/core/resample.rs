//! Time resampling of measurements.
//!
//! Filters that process asynchronous sensor streams must sometimes cut a
//! measurement spanning `[t0, t2]` at an intermediate time `t1` (split), or
//! combine two consecutive measurements into one covering their union
//! (merge). These helpers implement the default policies and the interval
//! validation shared by every residual.

use crate::error::{GifError, GifResult};
use crate::state::State;
use crate::time::{to_sec, TimePoint};

/// Require `t0 <= t1 <= t2`.
pub fn validate_split_times(t0: TimePoint, t1: TimePoint, t2: TimePoint) -> GifResult<()> {
    if t0 <= t1 && t1 <= t2 {
        Ok(())
    } else {
        Err(GifError::InvalidTimeInterval(format!(
            "expected t0 <= t1 <= t2, got t0 = {t0}, t1 = {t1}, t2 = {t2}"
        )))
    }
}

/// Fraction `(t1 - t0) / (t2 - t0)` of the interval covered at `t1`.
///
/// Fails on unordered times and on a zero-length interval.
pub fn interval_ratio(t0: TimePoint, t1: TimePoint, t2: TimePoint) -> GifResult<f64> {
    validate_split_times(t0, t1, t2)?;
    let total = to_sec(t2 - t0);
    if total <= 0.0 {
        return Err(GifError::InvalidTimeInterval(format!(
            "zero-length interval at {t0}"
        )));
    }
    Ok(to_sec(t1 - t0) / total)
}

/// Default merge: `in2 ⊞ ratio · (in1 ⊟ in2)`.
///
/// For vector and rotation elements this moves along the geodesic from
/// `in2` (at `t1 == t0`) to `in1` (at `t1 == t2`).
pub fn interpolate_merge(
    in1: &State,
    in2: &State,
    t0: TimePoint,
    t1: TimePoint,
    t2: TimePoint,
) -> GifResult<State> {
    let ratio = interval_ratio(t0, t1, t2)?;
    let diff = in1.boxminus(in2)?;
    in2.boxplus(&(diff * ratio))
}
