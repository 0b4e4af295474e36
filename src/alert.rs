// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Event tracker alerts, as delivered on stdin.
 */

use serde::Deserialize;

use crate::segments::GpsTime;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Alert {
    pub alert_type: String,

    /// The event's id, e.g. "G184098".
    pub uid: String,

    /// The event itself, if the alert carries it.
    #[serde(default)]
    pub object: Option<AlertObject>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AlertObject {
    #[serde(default)]
    pub gpstime: Option<f64>,
}

impl Alert {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Only alerts for new events are acted upon.
    pub fn is_new(&self) -> bool {
        self.alert_type == "new"
    }

    pub fn gps_time(&self) -> Option<GpsTime> {
        self.object
            .as_ref()
            .and_then(|o| o.gpstime)
            .map(GpsTime::from_seconds_f64)
    }
}
