// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use log::info;
use structopt::StructOpt;

use seglogic::alert::Alert;
use seglogic::config::Config;
use seglogic::jobs::JobContext;
use seglogic::report::{LogReporter, OutboxReporter, Reporter};
use seglogic::schedule;
use seglogic::segments::GpsTime;
use seglogic::time::gps_now;

/// Look for data-quality segments around an event and report them to the
/// event tracker.
///
/// Without --graceid, an alert is read from stdin and only "new" alerts are
/// processed.
#[derive(StructOpt, Debug)]
#[structopt(name = "seglogic")]
struct Opts {
    /// The TOML config file.
    #[structopt(parse(from_os_str))]
    config: PathBuf,

    /// The event to process.
    #[structopt(short, long)]
    graceid: Option<String>,

    /// The GPS time of the event. Required unless the alert carries it.
    #[structopt(long)]
    gps_time: Option<f64>,

    /// Only log what would be posted to the event tracker.
    #[structopt(short = "n", long)]
    skip_gracedb_upload: bool,

    /// Where to queue posts for the event tracker. Defaults to
    /// <output_dir>/<graceid>-outbox.jsonl.
    #[structopt(long, parse(from_os_str))]
    outbox: Option<PathBuf>,

    /// Print progress. Overridden by RUST_LOG.
    #[structopt(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::from_args();
    let level = if opts.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let (graceid, alert_time) = match &opts.graceid {
        Some(g) => (g.clone(), None),
        None => {
            let mut alert = String::new();
            std::io::stdin().read_to_string(&mut alert)?;
            info!("alert received:\n{}", alert);
            let alert = Alert::from_json(&alert).context("Couldn't parse the alert")?;
            if !alert.is_new() {
                info!("alert_type != new, ignoring...");
                return Ok(());
            }
            let time = alert.gps_time();
            (alert.uid, time)
        }
    };
    let event_time = match (opts.gps_time, alert_time) {
        (Some(t), _) => GpsTime::from_seconds_f64(t),
        (None, Some(t)) => t,
        (None, None) => bail!("No GPS time for {}; supply --gps-time", graceid),
    };
    info!("processing {} -> {}", graceid, event_time);

    info!("reading config from : {}", opts.config.display());
    let config = Config::from_file(&opts.config)?;
    std::fs::create_dir_all(&config.general.output_dir).with_context(|| {
        format!(
            "Couldn't create output directory {}",
            config.general.output_dir.display()
        )
    })?;

    let reporter: Box<dyn Reporter> = if opts.skip_gracedb_upload {
        Box::new(LogReporter::new(graceid.clone()))
    } else {
        let outbox = opts.outbox.clone().unwrap_or_else(|| {
            config
                .general
                .output_dir
                .join(format!("{}-outbox.jsonl", graceid))
        });
        info!("queueing posts in : {}", outbox.display());
        Box::new(OutboxReporter::new(graceid.clone(), &outbox)?)
    };

    let ctx = Arc::new(JobContext {
        config,
        graceid,
        event_time,
        reporter,
    });
    let summary = schedule::run(ctx, gps_now()).await?;
    info!(
        "{} reported, {} failed queries",
        summary.reported.len(),
        summary.query_failures.len()
    );
    if !summary.is_success() {
        let failed: Vec<_> = summary.errors.iter().map(|(name, _)| name.as_str()).collect();
        bail!("Couldn't evaluate: {}", failed.join(", "));
    }

    Ok(())
}
