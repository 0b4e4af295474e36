// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The interval model: GPS times, durations, query windows and segments.
 *
 * Segment databases report times as integer GPS seconds plus an integer
 * nanosecond part. These are kept exactly as a count of nanoseconds, so sums
 * of segment lengths never depend on the order they're added in.
 */

pub mod error;

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

pub use error::CoverageError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A GPS time, stored as an exact number of nanoseconds since the GPS epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsTime(i64);

impl GpsTime {
    /// Combine integer GPS seconds and a nanosecond part without any loss of
    /// precision. Saturates at the representable range; use
    /// [GpsTime::try_from_parts] for untrusted values.
    pub fn from_parts(seconds: i64, nanoseconds: i64) -> Self {
        GpsTime(
            seconds
                .saturating_mul(NANOS_PER_SECOND)
                .saturating_add(nanoseconds),
        )
    }

    /// As [GpsTime::from_parts], for values read from segment tables. The
    /// nanosecond part must be in `[0, 1e9)` and the total must fit.
    pub fn try_from_parts(seconds: i64, nanoseconds: i64) -> Result<Self, CoverageError> {
        let out_of_range = CoverageError::TimeOutOfRange {
            seconds,
            nanoseconds,
        };
        if !(0..NANOS_PER_SECOND).contains(&nanoseconds) {
            return Err(out_of_range);
        }
        seconds
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|n| n.checked_add(nanoseconds))
            .map(GpsTime)
            .ok_or(out_of_range)
    }

    /// Whole GPS seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        GpsTime::from_parts(seconds, 0)
    }

    /// From a float number of GPS seconds, e.g. an event time reported by the
    /// event tracker. Rounded to the nearest nanosecond.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * NANOS_PER_SECOND as f64).round() as i64;
        GpsTime::from_parts(whole as i64, nanos)
    }

    pub fn as_nanoseconds(self) -> i64 {
        self.0
    }

    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    /// The largest whole GPS second not after this time.
    pub fn floor_seconds(self) -> i64 {
        self.0.div_euclid(NANOS_PER_SECOND)
    }

    /// The smallest whole GPS second not before this time.
    pub fn ceil_seconds(self) -> i64 {
        let floor = self.floor_seconds();
        if self.0.rem_euclid(NANOS_PER_SECOND) == 0 {
            floor
        } else {
            floor + 1
        }
    }

    pub fn checked_add(self, rhs: GpsDuration) -> Option<GpsTime> {
        self.0.checked_add(rhs.0).map(GpsTime)
    }

    pub fn checked_sub(self, rhs: GpsDuration) -> Option<GpsTime> {
        self.0.checked_sub(rhs.0).map(GpsTime)
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.as_seconds())
    }
}

/// A signed span of time with nanosecond resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsDuration(i64);

impl GpsDuration {
    pub const ZERO: GpsDuration = GpsDuration(0);

    pub fn from_nanoseconds(nanoseconds: i64) -> Self {
        GpsDuration(nanoseconds)
    }

    /// Rounded to the nearest nanosecond. Saturates at the representable
    /// range.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        GpsDuration((seconds * NANOS_PER_SECOND as f64).round() as i64)
    }

    /// `None` if `seconds` isn't finite or doesn't fit in nanoseconds.
    pub fn try_from_seconds_f64(seconds: f64) -> Option<Self> {
        let nanos = (seconds * NANOS_PER_SECOND as f64).round();
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
        if nanos.is_finite() && nanos >= i64::MIN as f64 && nanos < i64::MAX as f64 {
            Some(GpsDuration(nanos as i64))
        } else {
            None
        }
    }

    pub fn as_nanoseconds(self) -> i64 {
        self.0
    }

    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

// The operators saturate. Sums of segment lengths that saturate are far longer
// than any window, so they are reported as out of range by `evaluate`.

impl Sub for GpsTime {
    type Output = GpsDuration;

    fn sub(self, rhs: GpsTime) -> GpsDuration {
        GpsDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Add<GpsDuration> for GpsTime {
    type Output = GpsTime;

    fn add(self, rhs: GpsDuration) -> GpsTime {
        GpsTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub<GpsDuration> for GpsTime {
    type Output = GpsTime;

    fn sub(self, rhs: GpsDuration) -> GpsTime {
        GpsTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for GpsDuration {
    type Output = GpsDuration;

    fn add(self, rhs: GpsDuration) -> GpsDuration {
        GpsDuration(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for GpsDuration {
    fn add_assign(&mut self, rhs: GpsDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for GpsDuration {
    fn sum<I: Iterator<Item = GpsDuration>>(iter: I) -> GpsDuration {
        iter.fold(GpsDuration::ZERO, Add::add)
    }
}

/// The query range for one flag evaluation. `end` is always after `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start: GpsTime,
    end: GpsTime,
}

impl TimeWindow {
    pub fn new(start: GpsTime, end: GpsTime) -> Result<Self, CoverageError> {
        if end <= start {
            return Err(CoverageError::InvalidWindow { start, end });
        }
        if end.0.checked_sub(start.0).is_none() {
            return Err(CoverageError::TimeOverflow);
        }
        Ok(TimeWindow { start, end })
    }

    /// The window around an event that the query tools are asked about. The
    /// tools only take whole seconds, so the window is widened outwards to
    /// integer GPS seconds.
    pub fn around(
        event_time: GpsTime,
        look_left: GpsDuration,
        look_right: GpsDuration,
    ) -> Result<Self, CoverageError> {
        let start = event_time
            .checked_sub(look_left)
            .ok_or(CoverageError::TimeOverflow)?;
        let end = event_time
            .checked_add(look_right)
            .ok_or(CoverageError::TimeOverflow)?;
        TimeWindow::new(
            GpsTime::try_from_parts(start.floor_seconds(), 0)?,
            GpsTime::try_from_parts(end.ceil_seconds(), 0)?,
        )
    }

    pub fn start(&self) -> GpsTime {
        self.start
    }

    pub fn end(&self) -> GpsTime {
        self.end
    }

    pub fn duration(&self) -> GpsDuration {
        self.end - self.start
    }

    /// The window's start in whole seconds. Only meaningful for windows made
    /// with [TimeWindow::around].
    pub fn start_seconds(&self) -> i64 {
        self.start.floor_seconds()
    }

    pub fn end_seconds(&self) -> i64 {
        self.end.ceil_seconds()
    }

    pub fn duration_seconds(&self) -> i64 {
        self.end_seconds() - self.start_seconds()
    }
}

/// One interval during which a flag was defined or active, as reported by the
/// segment database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    start: GpsTime,
    end: GpsTime,
    definition_id: String,
}

impl Segment {
    /// A segment may have zero length, but may not end before it starts.
    pub fn new<T: Into<String>>(
        start: GpsTime,
        end: GpsTime,
        definition_id: T,
    ) -> Result<Self, CoverageError> {
        if end < start {
            return Err(CoverageError::InvalidSegment { start, end });
        }
        if end.0.checked_sub(start.0).is_none() {
            return Err(CoverageError::TimeOverflow);
        }
        Ok(Segment {
            start,
            end,
            definition_id: definition_id.into(),
        })
    }

    pub fn start(&self) -> GpsTime {
        self.start
    }

    pub fn end(&self) -> GpsTime {
        self.end
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    pub fn duration(&self) -> GpsDuration {
        self.end - self.start
    }

    /// Closed-interval membership: both ends count.
    pub fn contains(&self, time: GpsTime) -> bool {
        self.start <= time && time <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    #[test]
    fn gps_time_from_parts_is_exact() {
        let t = GpsTime::from_parts(1126259462, 391_000_000);
        assert_eq!(t.as_nanoseconds(), 1126259462391000000);
        assert_eq!(t.floor_seconds(), 1126259462);
        assert_eq!(t.ceil_seconds(), 1126259463);
    }

    #[test]
    fn gps_time_from_float() {
        let t = GpsTime::from_seconds_f64(1000.25);
        assert_eq!(t, GpsTime::from_parts(1000, 250_000_000));
        assert_abs_diff_eq!(t.as_seconds(), 1000.25, epsilon = 1e-9);
    }

    #[test]
    fn whole_seconds_round_to_themselves() {
        let t = GpsTime::from_seconds(1000);
        assert_eq!(t.floor_seconds(), 1000);
        assert_eq!(t.ceil_seconds(), 1000);
    }

    #[test]
    fn window_around_event_widens_to_whole_seconds() {
        let event = GpsTime::from_seconds_f64(1000.5);
        let w = TimeWindow::around(
            event,
            GpsDuration::from_seconds_f64(10.0),
            GpsDuration::from_seconds_f64(10.0),
        )
        .unwrap();
        assert_eq!(w.start_seconds(), 990);
        assert_eq!(w.end_seconds(), 1011);
        assert_eq!(w.duration_seconds(), 21);
    }

    #[test]
    fn window_around_integer_event_keeps_bounds() {
        let w = TimeWindow::around(
            GpsTime::from_seconds(1000),
            GpsDuration::from_seconds_f64(5.0),
            GpsDuration::from_seconds_f64(5.0),
        )
        .unwrap();
        assert_eq!(w.start_seconds(), 995);
        assert_eq!(w.end_seconds(), 1005);
    }

    #[test]
    fn empty_or_backwards_windows_are_rejected() {
        let t = GpsTime::from_seconds(1000);
        assert!(matches!(
            TimeWindow::new(t, t),
            Err(CoverageError::InvalidWindow { .. })
        ));
        assert!(TimeWindow::new(t, GpsTime::from_seconds(999)).is_err());
    }

    #[test]
    fn backwards_segments_are_rejected() {
        let result = Segment::new(GpsTime::from_seconds(10), GpsTime::from_seconds(9), "0");
        assert!(matches!(result, Err(CoverageError::InvalidSegment { .. })));
    }

    #[test]
    fn segment_contains_is_inclusive() {
        let s = Segment::new(GpsTime::from_seconds(10), GpsTime::from_seconds(20), "0").unwrap();
        assert!(s.contains(GpsTime::from_seconds(10)));
        assert!(s.contains(GpsTime::from_seconds(20)));
        assert!(s.contains(GpsTime::from_seconds(15)));
        assert!(!s.contains(GpsTime::from_parts(20, 1)));
        assert!(!s.contains(GpsTime::from_parts(9, 999_999_999)));
    }

    #[test]
    fn table_times_are_range_checked() {
        assert_eq!(
            GpsTime::try_from_parts(1000, 999_999_999).unwrap(),
            GpsTime::from_parts(1000, 999_999_999)
        );
        for (s, ns) in &[
            (10_000_000_000, 0),
            (i64::MIN, 0),
            (1000, 1_000_000_000),
            (1000, -1),
        ] {
            assert!(
                matches!(
                    GpsTime::try_from_parts(*s, *ns),
                    Err(CoverageError::TimeOutOfRange { .. })
                ),
                "({}, {})",
                s,
                ns
            );
        }
    }

    #[test]
    fn huge_values_saturate_instead_of_wrapping() {
        let max = GpsTime::from_seconds(10_000_000_000);
        assert_eq!(max.as_nanoseconds(), i64::MAX);
        assert_eq!(
            (max + GpsDuration::from_nanoseconds(1)).as_nanoseconds(),
            i64::MAX
        );
        let total: GpsDuration = vec![GpsDuration::from_nanoseconds(i64::MAX); 3]
            .into_iter()
            .sum();
        assert_eq!(total.as_nanoseconds(), i64::MAX);
    }

    #[test]
    fn out_of_range_float_durations_are_rejected() {
        assert_eq!(
            GpsDuration::try_from_seconds_f64(1.5),
            Some(GpsDuration::from_nanoseconds(1_500_000_000))
        );
        assert_eq!(GpsDuration::try_from_seconds_f64(1e12), None);
        assert_eq!(GpsDuration::try_from_seconds_f64(f64::NAN), None);
        assert_eq!(GpsDuration::try_from_seconds_f64(f64::INFINITY), None);
    }

    #[test]
    fn windows_that_overflow_are_errors() {
        let result = TimeWindow::around(
            GpsTime::from_seconds(1000),
            GpsDuration::from_seconds_f64(1.0),
            GpsDuration::from_nanoseconds(i64::MAX),
        );
        assert_eq!(result, Err(CoverageError::TimeOverflow));

        let result = TimeWindow::new(
            GpsTime::from_seconds(i64::MIN),
            GpsTime::from_seconds(1),
        );
        assert_eq!(result, Err(CoverageError::TimeOverflow));
    }

    #[test]
    fn zero_length_segment_contains_its_instant() {
        let t = GpsTime::from_seconds(1003);
        let s = Segment::new(t, t, "0").unwrap();
        assert!(s.duration().is_zero());
        assert!(s.contains(t));
    }
}
