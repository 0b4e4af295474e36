// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Running every job for an event, each as soon as its data is available.
 *
 * Every job gets its own task that sleeps until a monotonic deadline (the end
 * of its window plus its wait) before querying. Jobs with different deadlines
 * don't hold each other up.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time::{sleep_until, Instant};

use crate::jobs::{execute, jobs, Job, JobContext, JobOutcome};
use crate::message;
use crate::report::ReportError;
use crate::segments::{GpsDuration, GpsTime};

/// What happened to each job.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs whose results were posted.
    pub reported: Vec<String>,

    /// Jobs whose queries failed; these were reported and skipped.
    pub query_failures: Vec<String>,

    /// Jobs that failed, with why.
    pub errors: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Convert a GPS time to a monotonic deadline, given the GPS time `now`
/// corresponds to the instant `clock`. Times in the past are due immediately.
pub fn deadline(ready_at: GpsTime, now: GpsTime, clock: Instant) -> Instant {
    let wait = ready_at - now;
    if wait > GpsDuration::ZERO {
        clock + Duration::from_nanos(wait.as_nanoseconds() as u64)
    } else {
        clock
    }
}

/// Run `jobs` concurrently, each after its deadline. `now` is the current GPS
/// time.
pub async fn run_jobs(jobs: Vec<Job>, ctx: Arc<JobContext>, now: GpsTime) -> RunSummary {
    let clock = Instant::now();
    let mut summary = RunSummary::default();
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let name = job.name().to_string();
        let ready_at = match job.ready_at(ctx.event_time) {
            Ok(t) => t,
            Err(e) => {
                error!("{}: {}", name, e);
                summary.errors.push((name, e.to_string()));
                continue;
            }
        };
        let deadline = deadline(ready_at, now, clock);
        let ctx = Arc::clone(&ctx);
        handles.push((
            name.clone(),
            tokio::spawn(async move {
                let wait = deadline.saturating_duration_since(Instant::now());
                if wait > Duration::from_secs(0) {
                    info!("{}: waiting {:.3} sec", name, wait.as_secs_f64());
                }
                sleep_until(deadline).await;
                tokio::task::spawn_blocking(move || execute(&job, &ctx)).await
            }),
        ));
    }

    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(Ok(JobOutcome::Reported { .. }))) => summary.reported.push(name),
            Ok(Ok(Ok(JobOutcome::QueryFailed))) => summary.query_failures.push(name),
            Ok(Ok(Err(e))) => {
                error!("{}: {}", name, e);
                summary.errors.push((name, e.to_string()));
            }
            Ok(Err(e)) | Err(e) => {
                error!("{}: job panicked: {}", name, e);
                summary.errors.push((name, e.to_string()));
            }
        }
    }
    summary
}

/// The whole workflow for one event: announce the search, run every
/// configured job, and announce the end.
pub async fn run(ctx: Arc<JobContext>, now: GpsTime) -> Result<RunSummary, ReportError> {
    let url = ctx.config.general.segdb_url.clone();
    let tags = ctx.config.general.tags.clone();
    info!("searching for segments in : {}", url);
    ctx.reporter
        .write_log(&message::began_searching(&url), None, &tags)?;

    let summary = run_jobs(jobs(&ctx.config), Arc::clone(&ctx), now).await;

    ctx.reporter
        .write_log(&message::finished_searching(&url), None, &tags)?;
    Ok(summary)
}
