// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The units of work around one event: summarising a flag, summarising a veto
 * definer's categories, and listing all active flags.
 *
 * Each job queries an external tool, uploads the result file, evaluates it
 * and posts a summary with labels. A failed query is reported and skipped; a
 * result that can't be evaluated is an error.
 */

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::config::{AllActiveConfig, Config, FlagConfig, Timing, VetoDefinerConfig};
use crate::labels::decide_labels;
use crate::message;
use crate::query;
use crate::report::{ReportError, Reporter};
use crate::segments::{CoverageError, GpsTime};
use crate::tables::{self, veto_category_definition, SegmentTables, TableError, RESULT_DEFINITION};
use crate::veto::{find_veto_files, VetoError};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    Coverage(#[from] CoverageError),

    #[error("{0}")]
    Table(#[from] TableError),

    #[error("{0}")]
    Veto(#[from] VetoError),

    #[error("{0}")]
    Report(#[from] ReportError),

    #[error("Couldn't create output directory {dir}: {source}")]
    OutputDir {
        dir: PathBuf,
        source: std::io::Error,
    },
}

impl JobError {
    /// What the job was doing when it failed, for the posted warning.
    pub fn failed_step(&self) -> &'static str {
        match self {
            JobError::Coverage(_) | JobError::Table(_) => "evaluate the query results",
            JobError::Veto(_) => "find the veto query results",
            JobError::Report(_) => "report the results",
            JobError::OutputDir { .. } => "create the output directory",
        }
    }
}

/// Everything a job needs to know about the event and where to report.
pub struct JobContext {
    pub config: Config,
    pub graceid: String,
    pub event_time: GpsTime,
    pub reporter: Box<dyn Reporter>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Job {
    Flag { name: String, config: FlagConfig },
    VetoDefiner { name: String, config: VetoDefinerConfig },
    AllActive(AllActiveConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Results were evaluated and posted, along with these labels.
    Reported { labels: BTreeSet<String> },

    /// The query tool failed; this was reported and nothing else was done.
    QueryFailed,
}

impl Job {
    pub fn name(&self) -> &str {
        match self {
            Job::Flag { name, .. } => name,
            Job::VetoDefiner { name, .. } => name,
            Job::AllActive(_) => "allActive",
        }
    }

    pub fn timing(&self) -> &Timing {
        match self {
            Job::Flag { config, .. } => &config.timing,
            Job::VetoDefiner { config, .. } => &config.timing,
            Job::AllActive(config) => &config.timing,
        }
    }

    /// When this job's results should be available in the segment database.
    pub fn ready_at(&self, event_time: GpsTime) -> Result<GpsTime, CoverageError> {
        let timing = self.timing();
        timing.ready_at(&timing.window(event_time)?)
    }
}

/// All configured jobs, soonest to be ready first.
pub fn jobs(config: &Config) -> Vec<Job> {
    let mut jobs: Vec<Job> = config
        .flags
        .iter()
        .map(|(name, config)| Job::Flag {
            name: name.clone(),
            config: config.clone(),
        })
        .collect();
    jobs.extend(config.veto_definers.iter().map(|(name, config)| Job::VetoDefiner {
        name: name.clone(),
        config: config.clone(),
    }));
    if let Some(all_active) = &config.all_active {
        jobs.push(Job::AllActive(all_active.clone()));
    }
    // Stable, so ties keep their configured order.
    jobs.sort_by(|a, b| {
        let a = a.timing().wait + a.timing().look_right;
        let b = b.timing().wait + b.timing().look_right;
        a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
    });
    jobs
}

fn create_dir(dir: &Path) -> Result<(), JobError> {
    std::fs::create_dir_all(dir).map_err(|e| JobError::OutputDir {
        dir: dir.to_path_buf(),
        source: e,
    })
}

/// Run a job to completion. Failures after the query are posted as warnings
/// before being returned.
pub fn execute(job: &Job, ctx: &JobContext) -> Result<JobOutcome, JobError> {
    info!("Running {}", job.name());
    let result = match job {
        Job::Flag { name, config } => run_flag(name, config, ctx),
        Job::VetoDefiner { name, config } => run_veto_definer(name, config, ctx),
        Job::AllActive(config) => run_all_active(config, ctx),
    };
    if let Err(e) = &result {
        let query_tags = match job {
            Job::Flag { config, .. } => ctx.config.query_tags(&config.tags),
            Job::VetoDefiner { config, .. } => ctx.config.query_tags(&config.tags),
            Job::AllActive(config) => ctx.config.query_tags(&config.tags),
        };
        let warning = message::job_failed(job.name(), e.failed_step(), &e.to_string());
        if let Err(report_error) = ctx.reporter.write_log(&warning, None, &query_tags) {
            warn!("Couldn't report failure of {}: {}", job.name(), report_error);
        }
    }
    result
}

fn run_flag(name: &str, config: &FlagConfig, ctx: &JobContext) -> Result<JobOutcome, JobError> {
    let tags = ctx.config.tags(&config.tags);
    let query_tags = ctx.config.query_tags(&config.tags);
    let window = config.timing.window(ctx.event_time)?;

    let output_dir = &ctx.config.general.output_dir;
    create_dir(output_dir)?;
    let output = query::flag_filename(output_dir, name, &window);
    let cmd = query::flag_query(
        &ctx.config.programs.segment_query,
        &ctx.config.general.segdb_url,
        name,
        &window,
        &output,
        config.dmt.as_deref(),
    );
    info!("{}", cmd);
    if let Err(e) = cmd.run() {
        warn!("An error occurred while querying for {}: {}", name, e);
        ctx.reporter
            .write_log(&message::query_failed(name, "flag"), None, &query_tags)?;
        return Ok(JobOutcome::QueryFailed);
    }

    ctx.reporter.write_log(
        &message::query_result(name, &window),
        Some(&output),
        &query_tags,
    )?;

    let tables = SegmentTables::from_file(&output)?;
    let report = tables.evaluate_definition(RESULT_DEFINITION, &window, ctx.event_time)?;
    let labels = decide_labels(&report, &config.labels);

    let summary = message::flag_summary(name, &window, &report, &config.labels);
    info!("{}", summary);
    ctx.reporter.write_log(&summary, None, &tags)?;
    ctx.reporter.write_labels(&labels)?;
    Ok(JobOutcome::Reported { labels })
}

fn run_veto_definer(
    name: &str,
    config: &VetoDefinerConfig,
    ctx: &JobContext,
) -> Result<JobOutcome, JobError> {
    let tags = ctx.config.tags(&config.tags);
    let query_tags = ctx.config.query_tags(&config.tags);
    let window = config.timing.window(ctx.event_time)?;

    let output_dir = ctx.config.general.output_dir.join(name);
    create_dir(&output_dir)?;
    let cmd = query::veto_definer_query(
        &ctx.config.programs.veto_definer_query,
        &ctx.config.general.segdb_url,
        &config.path,
        &window,
        &output_dir,
        config.dmt.as_deref(),
    );
    info!("{}", cmd);
    if let Err(e) = cmd.run() {
        warn!("An error occurred while querying for {}: {}", name, e);
        ctx.reporter.write_log(
            &message::query_failed(name, "veto definer"),
            None,
            &query_tags,
        )?;
        return Ok(JobOutcome::QueryFailed);
    }

    let mut header = name.to_string();
    let mut body = String::new();
    let mut labels = BTreeSet::new();
    for (ifo, categories) in find_veto_files(&output_dir, &window)? {
        info!("{}: working on IFO {}", name, ifo);
        for (category, files) in categories {
            for file in files {
                ctx.reporter.write_log(
                    &message::query_result(&format!("{} -> {}:{}", name, ifo, category), &window),
                    Some(&file),
                    &query_tags,
                )?;

                let tables = SegmentTables::from_file(&file)?;
                let category_name = veto_category_definition(&category);
                let report =
                    tables.evaluate_definition(&category_name, &window, ctx.event_time)?;
                header += &message::veto_category_summary(
                    &ifo,
                    &category,
                    &window,
                    &report,
                    &config.labels,
                );
                labels.extend(decide_labels(&report, &config.labels));

                for definition in tables.definitions_except(&category_name) {
                    let report = tables.evaluate_id(
                        &definition.segment_def_id,
                        &window,
                        ctx.event_time,
                    )?;
                    body += &message::veto_flag_summary(
                        &definition.flag_name(),
                        &ifo,
                        &category,
                        &window,
                        &report,
                    );
                }
            }
        }
    }

    let summary = format!("{}<br>{}", header, body);
    info!("{}", summary);
    ctx.reporter.write_log(&summary, None, &tags)?;
    ctx.reporter.write_labels(&labels)?;
    Ok(JobOutcome::Reported { labels })
}

fn run_all_active(config: &AllActiveConfig, ctx: &JobContext) -> Result<JobOutcome, JobError> {
    let tags = ctx.config.tags(&config.tags);
    let query_tags = ctx.config.query_tags(&config.tags);
    let window = config.timing.window(ctx.event_time)?;

    let output_dir = &ctx.config.general.output_dir;
    create_dir(output_dir)?;
    let output = query::all_active_filename(output_dir, &window);
    // The tool only works with integer times.
    let cmd = query::all_active_query(
        &ctx.config.programs.dq_query,
        &ctx.config.general.segdb_url,
        ctx.event_time.floor_seconds(),
        &window,
        &output,
        false,
    );
    info!("{}", cmd);
    if let Err(e) = cmd.run() {
        warn!("An error occurred while querying for all active flags: {}", e);
        ctx.reporter
            .write_log(&message::all_active_query_failed(), None, &query_tags)?;
        return Ok(JobOutcome::QueryFailed);
    }

    ctx.reporter.write_log(
        &message::query_result("all active flags", &window),
        Some(&output),
        &query_tags,
    )?;

    if config.human_readable {
        let flags = tables::read_active_flags(&output)?;
        let summary = message::active_flags(&flags);
        info!("{}", summary);
        ctx.reporter.write_log(&summary, None, &tags)?;
    }
    Ok(JobOutcome::Reported {
        labels: BTreeSet::new(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::report::tests::MemoryReporter;
    use crate::report::Record;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    const FLAG_TABLES: &str = r#"{
        "segment_definer": [{"segment_def_id": "0", "ifos": "H1", "name": "RESULT", "version": 1}],
        "segment_summary": [{"segment_def_id": "0", "start_time": 1000, "end_time": 1010}],
        "segment": [{"segment_def_id": "0", "start_time": 1002, "end_time": 1005}]
    }"#;

    const VETO_TABLES: &str = r#"{
        "segment_definer": [
            {"segment_def_id": "0", "ifos": "H1", "name": "VETO_CAT1"},
            {"segment_def_id": "1", "ifos": "H1", "name": "DCH-BAD_THING", "version": 2},
            {"segment_def_id": "2", "ifos": "H1", "name": "DCH-OTHER_THING", "version": 1}
        ],
        "segment_summary": [
            {"segment_def_id": "0", "start_time": 1000, "end_time": 1010},
            {"segment_def_id": "1", "start_time": 1000, "end_time": 1010},
            {"segment_def_id": "2", "start_time": 1000, "end_time": 1010}
        ],
        "segment": [
            {"segment_def_id": "0", "start_time": 1003, "end_time": 1004},
            {"segment_def_id": "1", "start_time": 1003, "end_time": 1004}
        ]
    }"#;

    /// Write an executable shell script that finds the "-o" argument and runs
    /// `body` with it in $out.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        let script = format!(
            "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n  shift\ndone\n{}\n",
            body
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn config(dir: &Path, extra: &str) -> Config {
        let toml = format!(
            r#"
[general]
output_dir = "{}"
tags = ["dq"]
query_tags = ["dq_query"]
{}
"#,
            dir.join("out").display(),
            extra
        );
        Config::from_toml(&toml).unwrap()
    }

    fn context(config: Config) -> (JobContext, Arc<MemoryReporter>) {
        let reporter = Arc::new(MemoryReporter::default());
        let ctx = JobContext {
            config,
            graceid: "G1".to_string(),
            event_time: GpsTime::from_seconds(1003),
            reporter: Box::new(Arc::clone(&reporter)),
        };
        (ctx, reporter)
    }

    fn flag_job(ctx: &JobContext) -> Job {
        jobs(&ctx.config).remove(0)
    }

    #[test]
    fn test_flag_job() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("flag.json");
        std::fs::write(&fixture, FLAG_TABLES).unwrap();
        let tool = fake_tool(dir.path(), "query", &format!("cat {} > \"$out\"", fixture.display()));
        let (ctx, reporter) = context(config(
            dir.path(),
            &format!(
                r#"
[programs]
segment_query = "{}"

[flags."H1:DMT-ANALYSIS_READY:1"]
look_left = 3.0
look_right = 7.0
active_labels = ["H1ACTIVE"]
flagged_labels = ["DQV"]
unflagged_labels = ["H1OK"]
"#,
                tool
            ),
        ));

        let outcome = execute(&flag_job(&ctx), &ctx).unwrap();
        let expected: BTreeSet<String> = vec!["DQV".to_string(), "H1ACTIVE".to_string()]
            .into_iter()
            .collect();
        assert_eq!(outcome, JobOutcome::Reported { labels: expected });

        let records = reporter.records();
        match &records[0] {
            Record::Log {
                message,
                filename,
                tags,
                ..
            } => {
                assert_eq!(
                    message,
                    "SegDb query for H1:DMT-ANALYSIS_READY:1 within [1000, 1010]"
                );
                assert_eq!(
                    filename.as_ref().unwrap(),
                    &dir.path()
                        .join("out")
                        .join("H1-DMT_ANALYSIS_READY_1-1000-10.json")
                );
                assert!(tags.contains(&"dq_query".to_string()));
            }
            r => panic!("Unexpected record {:?}", r),
        }
        let messages = reporter.messages();
        assert!(messages[1].contains("active : 3.000/10=30.000%"));
        assert!(messages[1].contains("candidate is within these segments!"));
        assert_eq!(reporter.labels(), vec!["DQV".to_string(), "H1ACTIVE".to_string()]);
    }

    #[test]
    fn test_failed_query_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, reporter) = context(config(
            dir.path(),
            r#"
[programs]
segment_query = "false"

[flags."L1:DMT-ANALYSIS_READY:1"]
look_left = 1.0
look_right = 1.0
inactive_labels = ["L1NO"]
"#,
        ));
        let outcome = execute(&flag_job(&ctx), &ctx).unwrap();
        assert_eq!(outcome, JobOutcome::QueryFailed);
        let messages = reporter.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("L1:DMT-ANALYSIS_READY:1<br>"));
        assert!(messages[0].contains("<b>WARNING</b>"));
        assert!(reporter.labels().is_empty());
    }

    #[test]
    fn test_missing_definition_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("flag.json");
        std::fs::write(&fixture, VETO_TABLES).unwrap();
        let tool = fake_tool(dir.path(), "query", &format!("cat {} > \"$out\"", fixture.display()));
        let (ctx, reporter) = context(config(
            dir.path(),
            &format!(
                r#"
[programs]
segment_query = "{}"

[flags."H1:DMT-ANALYSIS_READY:1"]
look_left = 3.0
look_right = 7.0
"#,
                tool
            ),
        ));
        let result = execute(&flag_job(&ctx), &ctx);
        assert!(matches!(
            result,
            Err(JobError::Coverage(CoverageError::DefinitionNotFound { .. }))
        ));
        // The query result was uploaded, then the failure was reported.
        let messages = reporter.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("couldn't evaluate the query results"));
        assert!(messages[1].contains("No segment definition named 'RESULT'"));
        assert!(reporter.labels().is_empty());
    }

    #[test]
    fn test_output_dir_failure_is_worded_as_such() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the output directory should be.
        std::fs::write(dir.path().join("out"), "").unwrap();
        let (ctx, reporter) = context(config(
            dir.path(),
            r#"
[flags."H1:DMT-ANALYSIS_READY:1"]
look_left = 3.0
look_right = 7.0
"#,
        ));
        let result = execute(&flag_job(&ctx), &ctx);
        assert!(matches!(result, Err(JobError::OutputDir { .. })));
        let messages = reporter.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("couldn't create the output directory"));
        assert!(!messages[0].contains("evaluate"));
    }

    #[test]
    fn test_veto_definer_job() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("veto.json");
        std::fs::write(&fixture, VETO_TABLES).unwrap();
        let tool = fake_tool(
            dir.path(),
            "veto-query",
            &format!(
                "cp {} \"$out/H1-VETOTIME_CAT1-1000-10.json\"",
                fixture.display()
            ),
        );
        let (ctx, reporter) = context(config(
            dir.path(),
            &format!(
                r#"
[programs]
veto_definer_query = "{}"

[veto_definers.H1-O3]
path = "/vetoes/H1-O3.xml"
look_left = 3.0
look_right = 7.0
active_labels = ["VETOACTIVE"]
flagged_labels = ["DQV"]
"#,
                tool
            ),
        ));

        let job = jobs(&ctx.config).remove(0);
        assert_eq!(job.name(), "H1-O3");
        let outcome = execute(&job, &ctx).unwrap();
        let expected: BTreeSet<String> = vec!["DQV".to_string(), "VETOACTIVE".to_string()]
            .into_iter()
            .collect();
        assert_eq!(outcome, JobOutcome::Reported { labels: expected });

        let messages = reporter.messages();
        assert_eq!(messages[0], "SegDb query for H1-O3 -> H1:CAT1 within [1000, 1010]");
        let summary = &messages[1];
        assert!(summary.starts_with("H1-O3<br>&nbsp;&nbsp;H1:CAT1"));
        assert!(summary.contains("candidate FAILS H1:CAT1 data quality checks"));
        let bad = summary.find("H1:DCH-BAD_THING:2 (H1:CAT1)").unwrap();
        let other = summary.find("H1:DCH-OTHER_THING:1 (H1:CAT1)").unwrap();
        assert!(bad < other);
        assert!(summary.ends_with("<b>candidate IS NOT within these segments</b>"));
    }

    #[test]
    fn test_all_active_job() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("active.json");
        std::fs::write(
            &fixture,
            r#"{"Active Results": {"L1:B:1": {}, "H1:A:1": {}}}"#,
        )
        .unwrap();
        let tool = fake_tool(dir.path(), "dq", &format!("cat {} > \"$out\"", fixture.display()));
        let (ctx, reporter) = context(config(
            dir.path(),
            &format!(
                r#"
[programs]
dq_query = "{}"

[all_active]
look_left = 3.0
look_right = 7.0
human_readable = true
"#,
                tool
            ),
        ));
        let job = jobs(&ctx.config).remove(0);
        execute(&job, &ctx).unwrap();
        assert_eq!(
            reporter.messages(),
            vec![
                "SegDb query for all active flags within [1000, 1010]".to_string(),
                "active flags include:<br>H1:A:1, L1:B:1".to_string(),
            ]
        );
    }

    #[test]
    fn test_jobs_are_ordered_by_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(
            dir.path(),
            r#"
[flags."H1:SLOW:1"]
look_left = 1.0
look_right = 1.0
wait = 100.0

[flags."H1:FAST:1"]
look_left = 1.0
look_right = 1.0

[veto_definers.V]
path = "v.xml"
look_left = 1.0
look_right = 10.0

[all_active]
look_left = 1.0
look_right = 2.0
"#,
        );
        let names: Vec<String> = jobs(&config).iter().map(|j| j.name().to_string()).collect();
        assert_eq!(names, vec!["H1:FAST:1", "allActive", "V", "H1:SLOW:1"]);
        assert_eq!(
            jobs(&config)[3].ready_at(GpsTime::from_seconds(1000)).unwrap(),
            GpsTime::from_seconds(1101)
        );
    }
}
