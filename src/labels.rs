// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Deciding which event labels follow from a flag's coverage.
 */

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::coverage::FlagReport;

/// Labels to apply to an event, per outcome of a flag evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Applied when the flag was active at any point in the window.
    pub active_labels: Vec<String>,

    /// Applied when the flag was never active in the window.
    pub inactive_labels: Vec<String>,

    /// Applied when the event time is inside an active segment.
    pub flagged_labels: Vec<String>,

    /// Applied when the event time is not inside any active segment.
    pub unflagged_labels: Vec<String>,
}

impl LabelPolicy {
    /// The labels from `active_labels` or `inactive_labels`, depending on
    /// whether the flag was active.
    pub fn activity_labels(&self, report: &FlagReport) -> &[String] {
        if report.is_active() {
            &self.active_labels
        } else {
            &self.inactive_labels
        }
    }

    /// The labels from `flagged_labels` or `unflagged_labels`, depending on
    /// whether the event itself was flagged.
    pub fn flagging_labels(&self, report: &FlagReport) -> &[String] {
        if report.is_reference_time_active {
            &self.flagged_labels
        } else {
            &self.unflagged_labels
        }
    }
}

/// All the labels `policy` prescribes for `report`, deduplicated.
///
/// A zero-length active segment at the event time gives an inactive but
/// flagged report; both halves of the policy are applied independently.
pub fn decide_labels(report: &FlagReport, policy: &LabelPolicy) -> BTreeSet<String> {
    policy
        .activity_labels(report)
        .iter()
        .chain(policy.flagging_labels(report))
        .cloned()
        .collect()
}
