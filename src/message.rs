// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The HTML messages posted to the event tracker.
 */

use itertools::Itertools;

use crate::coverage::FlagReport;
use crate::labels::LabelPolicy;
use crate::segments::{GpsDuration, TimeWindow};

const INDENT: &str = "&nbsp;&nbsp;";

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn coverage_line(
    kind: &str,
    duration: GpsDuration,
    percent: Option<f64>,
    window: &TimeWindow,
    depth: usize,
) -> String {
    let percent = match percent {
        Some(p) => format!("{:.3}%", p),
        None => "undefined".to_string(),
    };
    format!(
        "<br>{}{} : {:.3}/{}={}",
        indent(depth),
        kind,
        duration.as_seconds(),
        window.duration_seconds(),
        percent
    )
}

/// The "defined" and "active" lines of a summary.
fn coverage_lines(report: &FlagReport, window: &TimeWindow, depth: usize) -> String {
    coverage_line(
        "defined",
        report.defined_duration,
        report.defined_percent(window),
        window,
        depth,
    ) + &coverage_line(
        "active",
        report.active_duration,
        report.active_percent(window),
        window,
        depth,
    )
}

fn will_label(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(" <b>Will label as : {}.</b>", labels.iter().join(", "))
    }
}

pub fn began_searching(segdb_url: &str) -> String {
    format!("began searching for segments in : {}", segdb_url)
}

pub fn finished_searching(segdb_url: &str) -> String {
    format!("finished searching for segments in : {}", segdb_url)
}

/// Accompanies the upload of a query's result file.
pub fn query_result(name: &str, window: &TimeWindow) -> String {
    format!(
        "SegDb query for {} within [{}, {}]",
        name,
        window.start_seconds(),
        window.end_seconds()
    )
}

/// `what` is the kind of job, e.g. "flag" or "veto definer".
pub fn query_failed(name: &str, what: &str) -> String {
    format!(
        "{}<br>{}<b>WARNING</b>: an error occured while querying for this {}!",
        name,
        indent(1),
        what
    )
}

pub fn all_active_query_failed() -> String {
    "<b>WARNING</b>: an error occured while querying for all active flags!".to_string()
}

/// For a job that failed after its query ran. `what` says which step failed,
/// e.g. "evaluate the query results".
pub fn job_failed(name: &str, what: &str, reason: &str) -> String {
    format!(
        "{}<br>{}<b>WARNING</b>: couldn't {}: {}",
        name,
        indent(1),
        what,
        reason
    )
}

/// The summary of one flag: how much of the window it was defined and active
/// for, and whether the event was inside its segments.
pub fn flag_summary(
    flag: &str,
    window: &TimeWindow,
    report: &FlagReport,
    policy: &LabelPolicy,
) -> String {
    let mut message = flag.to_string();
    message += &coverage_lines(report, window, 1);
    message += &will_label(policy.activity_labels(report));
    message += &format!("<br>{}", indent(1));
    if report.is_reference_time_active {
        message += "<b>candidate is within these segments!</b>";
    } else {
        message += "<b>candidate is not within these segments!</b>";
    }
    message += &will_label(policy.flagging_labels(report));
    message
}

/// The summary of a whole veto category for one IFO.
pub fn veto_category_summary(
    ifo: &str,
    category: &str,
    window: &TimeWindow,
    report: &FlagReport,
    policy: &LabelPolicy,
) -> String {
    let mut message = format!("<br>{}{}:{}", indent(1), ifo, category);
    message += &coverage_lines(report, window, 2);
    message += &will_label(policy.activity_labels(report));
    message += &format!("<br>{}", indent(2));
    if report.is_reference_time_active {
        message += &format!(
            "<b>candidate FAILS {}:{} data quality checks</b>",
            ifo, category
        );
    } else {
        message += &format!(
            "<b>candidate PASSES {}:{} data quality checks</b>",
            ifo, category
        );
    }
    message += &will_label(policy.flagging_labels(report));
    message
}

/// The summary of one flag within a veto category. No labels follow from
/// individual flags.
pub fn veto_flag_summary(
    flag: &str,
    ifo: &str,
    category: &str,
    window: &TimeWindow,
    report: &FlagReport,
) -> String {
    let mut message = format!("<br>{} ({}:{})", flag, ifo, category);
    message += &coverage_lines(report, window, 1);
    message += &format!("<br>{}", indent(1));
    if report.is_reference_time_active {
        message += "<b>candidate IS within these segments</b>";
    } else {
        message += "<b>candidate IS NOT within these segments</b>";
    }
    message
}

pub fn active_flags<T: AsRef<str>>(flags: &[T]) -> String {
    format!(
        "active flags include:<br>{}",
        flags.iter().map(|f| f.as_ref()).sorted().join(", ")
    )
}
