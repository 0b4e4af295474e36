// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Coverage statistics for one flag (or veto category) over one time window.
 */

use crate::segments::{CoverageError, GpsDuration, GpsTime, Segment, TimeWindow};

/// How much of a window a flag was defined and active for, and whether the
/// event itself was flagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagReport {
    /// The total length of the "defined" segments.
    pub defined_duration: GpsDuration,

    /// The total length of the "active" segments.
    pub active_duration: GpsDuration,

    /// Does the reference time fall inside any active segment?
    pub is_reference_time_active: bool,

    /// The number of active segments containing the reference time.
    pub containing_segments: usize,
}

impl FlagReport {
    /// The defined time as a percentage of the window. `None` if the window
    /// has no duration.
    pub fn defined_percent(&self, window: &TimeWindow) -> Option<f64> {
        percent(self.defined_duration, window.duration())
    }

    /// The active time as a percentage of the window. `None` if the window
    /// has no duration.
    pub fn active_percent(&self, window: &TimeWindow) -> Option<f64> {
        percent(self.active_duration, window.duration())
    }

    pub fn is_active(&self) -> bool {
        self.active_duration > GpsDuration::ZERO
    }
}

fn percent(part: GpsDuration, whole: GpsDuration) -> Option<f64> {
    if whole.is_zero() {
        None
    } else {
        Some(part.as_seconds() / whole.as_seconds() * 100.0)
    }
}

fn total_duration(segments: &[Segment]) -> GpsDuration {
    segments.iter().map(Segment::duration).sum()
}

/// Evaluate coverage of `window` given segments already filtered to the
/// definition of interest.
///
/// Segments outside the window are summed like any other. If either total
/// exceeds the window duration, the query results can't be trusted and
/// [CoverageError::DurationOutOfRange] is returned.
pub fn evaluate(
    window: &TimeWindow,
    defined_segments: &[Segment],
    active_segments: &[Segment],
    reference_time: GpsTime,
) -> Result<FlagReport, CoverageError> {
    let defined_duration = total_duration(defined_segments);
    let active_duration = total_duration(active_segments);

    for (kind, duration) in &[("defined", defined_duration), ("active", active_duration)] {
        if *duration > window.duration() {
            return Err(CoverageError::DurationOutOfRange {
                kind: *kind,
                duration: *duration,
                window: window.duration(),
            });
        }
    }

    let containing_segments = active_segments
        .iter()
        .filter(|s| s.contains(reference_time))
        .count();

    Ok(FlagReport {
        defined_duration,
        active_duration,
        is_reference_time_active: containing_segments > 0,
        containing_segments,
    })
}
