// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Functions to help with time.
 */

use chrono::{DateTime, Datelike, Timelike, Utc};
use hifitime::Epoch;

use crate::segments::GpsTime;

/// The GPS epoch, 1980-01-06T00:00:00 UTC.
fn gps_epoch() -> Epoch {
    Epoch::from_gregorian_utc_hms(1980, 1, 6, 0, 0, 0)
}

/// Convert a `hifitime::Epoch` to GPS seconds. Leap seconds are handled by
/// going through TAI.
pub fn epoch_to_gps_seconds(epoch: &Epoch) -> f64 {
    epoch.as_tai_seconds() - gps_epoch().as_tai_seconds()
}

/// Convert a UTC instant to a GPS time.
pub fn utc_to_gps(utc: &DateTime<Utc>) -> GpsTime {
    let epoch = Epoch::from_gregorian_utc_hms(
        utc.year(),
        utc.month() as u8,
        utc.day() as u8,
        utc.hour() as u8,
        utc.minute() as u8,
        utc.second() as u8,
    );
    // Whole seconds go through hifitime's leap second table; the sub-second
    // part is added exactly.
    let whole = epoch_to_gps_seconds(&epoch).round() as i64;
    GpsTime::from_parts(whole, i64::from(utc.nanosecond()))
}

/// The current GPS time.
pub fn gps_now() -> GpsTime {
    utc_to_gps(&Utc::now())
}
