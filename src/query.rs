// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Command lines for the external segment database tools, and where their
 * results land.
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::segments::TimeWindow;

/// The environment variable the query tools read a DMT directory from.
const DMT_ENV_VAR: &str = "ONLINEDQ";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Couldn't run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// One invocation of an external query tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCommand {
    pub program: String,
    pub args: Vec<String>,
    /// An alternate data source. It's passed to the child process only, never
    /// set on this process.
    pub dmt: Option<PathBuf>,
}

impl fmt::Display for QueryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dmt) = &self.dmt {
            write!(f, "{}={} ", DMT_ENV_VAR, dmt.display())?;
        }
        write!(f, "{} {}", self.program, self.args.iter().join(" "))
    }
}

impl QueryCommand {
    /// Run the command to completion. A non-zero exit status is an error
    /// carrying the tool's stderr.
    pub fn run(&self) -> Result<(), QueryError> {
        debug!("Running: {}", self);
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dmt) = &self.dmt {
            command.env(DMT_ENV_VAR, dmt);
        }
        let output = command.output().map_err(|e| QueryError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;
        if !output.status.success() {
            return Err(QueryError::Failed {
                command: self.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Query the segments of a single flag, e.g.
///
/// `ligolw_segment_query_dqsegdb -t https://segments.ligo.org -q -a H1:DMT-ANALYSIS_READY:1 -s 1130950800 -e 1131559200 -o out.json`
pub fn flag_query(
    program: &str,
    url: &str,
    flag: &str,
    window: &TimeWindow,
    output: &Path,
    dmt: Option<&Path>,
) -> QueryCommand {
    let mut args = vec![];
    match dmt {
        Some(_) => args.push("--dmt-files".to_string()),
        None => args.extend(vec!["-t".to_string(), url.to_string()]),
    }
    args.extend(vec![
        "-q".to_string(),
        "-a".to_string(),
        flag.to_string(),
        "-s".to_string(),
        window.start_seconds().to_string(),
        "-e".to_string(),
        window.end_seconds().to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ]);
    QueryCommand {
        program: program.to_string(),
        args,
        dmt: dmt.map(Path::to_path_buf),
    }
}

/// Query the segments of every category of a veto definer file. The results
/// are written as one file per IFO and category into `output_dir`.
pub fn veto_definer_query(
    program: &str,
    url: &str,
    veto_definer: &Path,
    window: &TimeWindow,
    output_dir: &Path,
    dmt: Option<&Path>,
) -> QueryCommand {
    let mut args = vec![];
    match dmt {
        Some(_) => args.push("--dmt-file".to_string()),
        None => args.extend(vec!["-t".to_string(), url.to_string()]),
    }
    args.extend(vec![
        "-v".to_string(),
        veto_definer.display().to_string(),
        "-s".to_string(),
        window.start_seconds().to_string(),
        "-e".to_string(),
        window.end_seconds().to_string(),
        "-i".to_string(),
        "-p".to_string(),
        "-o".to_string(),
        output_dir.display().to_string(),
    ]);
    QueryCommand {
        program: program.to_string(),
        args,
        dmt: dmt.map(Path::to_path_buf),
    }
}

/// Query every flag around an integer GPS time. The tool takes the window as
/// offsets of its start and end from that time, so the start offset is
/// negative.
pub fn all_active_query(
    program: &str,
    url: &str,
    gps_seconds: i64,
    window: &TimeWindow,
    output: &Path,
    active_only: bool,
) -> QueryCommand {
    let mut args = vec![
        "-t".to_string(),
        url.to_string(),
        "-s".to_string(),
        (window.start_seconds() - gps_seconds).to_string(),
        "-e".to_string(),
        (window.end_seconds() - gps_seconds).to_string(),
        "-o".to_string(),
        output.display().to_string(),
        gps_seconds.to_string(),
    ];
    if active_only {
        args.push("-a".to_string());
    }
    QueryCommand {
        program: program.to_string(),
        args,
        dmt: None,
    }
}

/// Where a flag's query result goes, e.g. "H1:DMT-ANALYSIS_READY:1" queried
/// over [1000, 1010] becomes "H1-DMT_ANALYSIS_READY_1-1000-10.json".
pub fn flag_filename(output_dir: &Path, flag: &str, window: &TimeWindow) -> PathBuf {
    let mut parts = flag.split(':');
    let ifo = parts.next().unwrap_or_default();
    let rest = parts.map(|p| p.replace('-', "_")).join("_");
    output_dir.join(format!(
        "{}-{}-{}-{}.json",
        ifo,
        rest,
        window.start_seconds(),
        window.duration_seconds()
    ))
}

pub fn all_active_filename(output_dir: &Path, window: &TimeWindow) -> PathBuf {
    output_dir.join(format!(
        "allActive-{}-{}.json",
        window.start_seconds(),
        window.duration_seconds()
    ))
}
