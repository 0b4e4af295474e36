// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use anyhow::ensure;
use itertools::Itertools;
use structopt::StructOpt;

use seglogic::labels::{decide_labels, LabelPolicy};
use seglogic::segments::{GpsTime, TimeWindow};
use seglogic::tables::SegmentTables;

/// Print the coverage of one segment definition in a segment table document,
/// and the labels that would follow.
#[derive(StructOpt, Debug)]
#[structopt(name = "segment-coverage")]
struct Opts {
    /// The segment table document (JSON).
    #[structopt(parse(from_os_str))]
    tables: PathBuf,

    /// The start of the window [GPS seconds].
    #[structopt(short, long)]
    start: f64,

    /// The end of the window [GPS seconds].
    #[structopt(short, long)]
    end: f64,

    /// The time to check for being flagged, e.g. the event time [GPS
    /// seconds].
    #[structopt(short = "t", long)]
    gps_time: f64,

    /// The segment definition to evaluate, e.g. VETO_CAT1.
    #[structopt(short, long, default_value = "RESULT")]
    definition: String,

    #[structopt(long)]
    active_labels: Vec<String>,

    #[structopt(long)]
    inactive_labels: Vec<String>,

    #[structopt(long)]
    flagged_labels: Vec<String>,

    #[structopt(long)]
    unflagged_labels: Vec<String>,
}

fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::from_args();
    ensure!(
        opts.end > opts.start,
        "The window end ({}) must be after its start ({})",
        opts.end,
        opts.start
    );

    let window = TimeWindow::new(
        GpsTime::from_seconds_f64(opts.start),
        GpsTime::from_seconds_f64(opts.end),
    )?;
    let tables = SegmentTables::from_file(&opts.tables)?;
    let report = tables.evaluate_definition(
        &opts.definition,
        &window,
        GpsTime::from_seconds_f64(opts.gps_time),
    )?;
    let policy = LabelPolicy {
        active_labels: opts.active_labels,
        inactive_labels: opts.inactive_labels,
        flagged_labels: opts.flagged_labels,
        unflagged_labels: opts.unflagged_labels,
    };

    let percent = |p: Option<f64>| match p {
        Some(p) => format!("{:.3}%", p),
        None => "undefined".to_string(),
    };
    println!(
        "defined : {:.3}/{:.3}={}",
        report.defined_duration.as_seconds(),
        window.duration().as_seconds(),
        percent(report.defined_percent(&window))
    );
    println!(
        "active : {:.3}/{:.3}={}",
        report.active_duration.as_seconds(),
        window.duration().as_seconds(),
        percent(report.active_percent(&window))
    );
    println!(
        "flagged : {} ({} segments)",
        report.is_reference_time_active, report.containing_segments
    );
    println!(
        "labels : {}",
        decide_labels(&report, &policy).iter().join(", ")
    );

    Ok(())
}
