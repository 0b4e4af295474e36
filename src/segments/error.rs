// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Errors raised while accounting segment coverage.
 */

use thiserror::Error;

use super::{GpsDuration, GpsTime};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    /// The expected segment definition isn't in the definitions relation.
    #[error("No segment definition named '{name}' in the query results")]
    DefinitionNotFound { name: String },

    /// A segment that ends before it starts.
    #[error("Segment ends ({end}) before it starts ({start})")]
    InvalidSegment { start: GpsTime, end: GpsTime },

    /// A segment table time whose nanosecond part isn't in `[0, 1e9)`, or
    /// which doesn't fit in a nanosecond count.
    #[error("GPS time {seconds} s + {nanoseconds} ns is out of range")]
    TimeOutOfRange { seconds: i64, nanoseconds: i64 },

    /// Adding or subtracting an offset went beyond the representable times.
    #[error("GPS time arithmetic overflowed")]
    TimeOverflow,

    /// A query window with no extent.
    #[error("Time window [{start}, {end}] must end after it starts")]
    InvalidWindow { start: GpsTime, end: GpsTime },

    /// The summed segment lengths don't fit in the query window. The
    /// upstream results overlap or spill outside the window.
    #[error("{kind} duration {:.3} s exceeds the window duration {:.3} s", .duration.as_seconds(), .window.as_seconds())]
    DurationOutOfRange {
        kind: &'static str,
        duration: GpsDuration,
        window: GpsDuration,
    },
}
