// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The workflow configuration, read from a TOML file.
 *
 * ```toml
 * [general]
 * output_dir = "/tmp/segments"
 * tags = ["data_quality"]
 * query_tags = ["data_quality"]
 *
 * [flags."H1:DMT-ANALYSIS_READY:1"]
 * look_left = 5.0
 * look_right = 5.0
 * wait = 10.0
 * inactive_labels = ["H1NO"]
 *
 * [veto_definers.H1-O3]
 * path = "/path/to/H1-HOFT_C00_O3_CBC.xml"
 * look_left = 1.0
 * look_right = 1.0
 * flagged_labels = ["DQV"]
 *
 * [all_active]
 * look_left = 2.0
 * look_right = 2.0
 * human_readable = true
 * ```
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::labels::LabelPolicy;
use crate::segments::{CoverageError, GpsDuration, GpsTime, TimeWindow};

pub const DEFAULT_SEGDB_URL: &str = "https://segments.ligo.org";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {file}: {source}")]
    IO {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    #[error("{section}: {reason}")]
    Invalid { section: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    pub general: General,

    /// The external query programs. Defaults to the standard segment database
    /// tools.
    #[serde(default)]
    pub programs: Programs,

    /// Flags to summarise, keyed by their full name (e.g.
    /// "H1:DMT-ANALYSIS_READY:1").
    #[serde(default)]
    pub flags: BTreeMap<String, FlagConfig>,

    /// Veto definer files to summarise by category, keyed by a short name.
    /// The name is also the output sub-directory.
    #[serde(default)]
    pub veto_definers: BTreeMap<String, VetoDefinerConfig>,

    /// If present, report all flags active around the event.
    #[serde(default)]
    pub all_active: Option<AllActiveConfig>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct General {
    /// Where query results are written.
    pub output_dir: PathBuf,

    /// The segment database to query.
    #[serde(default = "default_segdb_url")]
    pub segdb_url: String,

    /// The event tracker the reports are destined for. `None` means the
    /// uploader's default.
    #[serde(default)]
    pub gracedb_url: Option<String>,

    /// Tags applied to every summary message.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tags applied to every message that attaches a query result.
    #[serde(default)]
    pub query_tags: Vec<String>,
}

fn default_segdb_url() -> String {
    DEFAULT_SEGDB_URL.to_string()
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Programs {
    pub segment_query: String,
    pub veto_definer_query: String,
    pub dq_query: String,
}

impl Default for Programs {
    fn default() -> Self {
        Programs {
            segment_query: "ligolw_segment_query_dqsegdb".to_string(),
            veto_definer_query: "ligolw_segments_from_cats_dqsegdb".to_string(),
            dq_query: "ligolw_dq_query_dqsegdb".to_string(),
        }
    }
}

/// When to query, relative to the event.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Timing {
    /// Seconds before the event to query.
    pub look_left: f64,

    /// Seconds after the event to query.
    pub look_right: f64,

    /// Seconds to wait after the end of the window before querying, so that
    /// the segment database has caught up.
    #[serde(default)]
    pub wait: f64,
}

impl Timing {
    pub fn window(&self, event_time: GpsTime) -> Result<TimeWindow, CoverageError> {
        TimeWindow::around(
            event_time,
            GpsDuration::from_seconds_f64(self.look_left),
            GpsDuration::from_seconds_f64(self.look_right),
        )
    }

    /// The GPS time at which this window's data should be available.
    pub fn ready_at(&self, window: &TimeWindow) -> Result<GpsTime, CoverageError> {
        window
            .end()
            .checked_add(GpsDuration::from_seconds_f64(self.wait))
            .ok_or(CoverageError::TimeOverflow)
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            section: section.to_string(),
            reason: reason.to_string(),
        };
        for (name, seconds) in &[
            ("look_left", self.look_left),
            ("look_right", self.look_right),
            ("wait", self.wait),
        ] {
            if GpsDuration::try_from_seconds_f64(*seconds).is_none() {
                return Err(invalid(&format!(
                    "{} must be a finite number of seconds within +/-9.2e9",
                    name
                )));
            }
        }
        if self.look_left + self.look_right <= 0.0 {
            return Err(invalid("the query window must have a positive duration"));
        }
        Ok(())
    }
}

/// Tags added on top of the general ones.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtraTags {
    pub extra_tags: Vec<String>,
    pub extra_query_tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FlagConfig {
    #[serde(flatten)]
    pub timing: Timing,

    #[serde(flatten)]
    pub tags: ExtraTags,

    #[serde(flatten)]
    pub labels: LabelPolicy,

    /// Query DMT files in this directory instead of the segment database.
    #[serde(default)]
    pub dmt: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VetoDefinerConfig {
    /// The veto definer file.
    pub path: PathBuf,

    #[serde(flatten)]
    pub timing: Timing,

    #[serde(flatten)]
    pub tags: ExtraTags,

    /// Applied per category. Veto definers usually only set the active and
    /// flagged labels.
    #[serde(flatten)]
    pub labels: LabelPolicy,

    #[serde(default)]
    pub dmt: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AllActiveConfig {
    #[serde(flatten)]
    pub timing: Timing,

    #[serde(flatten)]
    pub tags: ExtraTags,

    /// Also post the sorted list of active flag names.
    #[serde(default)]
    pub human_readable: bool,
}

impl Config {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<T: AsRef<Path>>(file: T) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(&file).map_err(|e| ConfigError::IO {
            file: file.as_ref().to_path_buf(),
            source: e,
        })?;
        Config::from_toml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, flag) in &self.flags {
            flag.timing.validate(&format!("flags.{}", name))?;
        }
        for (name, veto) in &self.veto_definers {
            veto.timing.validate(&format!("veto_definers.{}", name))?;
        }
        if let Some(all_active) = &self.all_active {
            all_active.timing.validate("all_active")?;
        }
        Ok(())
    }

    /// The tags for summary messages of a job.
    pub fn tags(&self, extra: &ExtraTags) -> Vec<String> {
        let mut tags = self.general.tags.clone();
        tags.extend(extra.extra_tags.iter().cloned());
        tags
    }

    /// The tags for messages attaching a job's query results.
    pub fn query_tags(&self, extra: &ExtraTags) -> Vec<String> {
        let mut tags = self.general.query_tags.clone();
        tags.extend(extra.extra_query_tags.iter().cloned());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[general]
output_dir = "/tmp/segments"
tags = ["data_quality"]
query_tags = ["data_quality", "query"]

[flags."H1:DMT-ANALYSIS_READY:1"]
look_left = 5.0
look_right = 5.5
wait = 10.0
extra_tags = ["H1"]
inactive_labels = ["H1NO"]
flagged_labels = ["DQV"]
dmt = "/dmt/H1"

[veto_definers.H1-O3]
path = "/vetoes/H1-O3.xml"
look_left = 1.0
look_right = 1.0
flagged_labels = ["DQV"]

[all_active]
look_left = 2.0
look_right = 2.0
human_readable = true
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(CONFIG).unwrap();
        assert_eq!(config.general.segdb_url, DEFAULT_SEGDB_URL);
        assert_eq!(config.general.gracedb_url, None);
        assert_eq!(config.programs, Programs::default());

        let flag = &config.flags["H1:DMT-ANALYSIS_READY:1"];
        assert_eq!(flag.timing.look_right, 5.5);
        assert_eq!(flag.timing.wait, 10.0);
        assert_eq!(flag.labels.inactive_labels, vec!["H1NO".to_string()]);
        assert!(flag.labels.active_labels.is_empty());
        assert_eq!(flag.dmt, Some(PathBuf::from("/dmt/H1")));
        assert_eq!(
            config.tags(&flag.tags),
            vec!["data_quality".to_string(), "H1".to_string()]
        );
        assert_eq!(
            config.query_tags(&flag.tags),
            vec!["data_quality".to_string(), "query".to_string()]
        );

        let veto = &config.veto_definers["H1-O3"];
        assert_eq!(veto.timing.wait, 0.0);
        assert_eq!(veto.dmt, None);
        assert_eq!(veto.labels.flagged_labels, vec!["DQV".to_string()]);

        assert!(config.all_active.unwrap().human_readable);
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml("[general]\noutput_dir = \".\"\n").unwrap();
        assert!(config.flags.is_empty());
        assert!(config.veto_definers.is_empty());
        assert!(config.all_active.is_none());
    }

    #[test]
    fn test_missing_general_fails() {
        assert!(matches!(
            Config::from_toml("[flags]\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_empty_window_fails() {
        let toml = r#"
[general]
output_dir = "."

[flags."L1:DMT-ANALYSIS_READY:1"]
look_left = 0.0
look_right = 0.0
"#;
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_program_overrides() {
        let toml = r#"
[general]
output_dir = "."

[programs]
segment_query = "/opt/fake-query"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.programs.segment_query, "/opt/fake-query");
        assert_eq!(config.programs.dq_query, "ligolw_dq_query_dqsegdb");
    }

    #[test]
    fn test_ready_at() {
        let timing = Timing {
            look_left: 1.0,
            look_right: 1.5,
            wait: 3.0,
        };
        let window = timing.window(GpsTime::from_seconds(1000)).unwrap();
        assert_eq!(window.end_seconds(), 1002);
        assert_eq!(timing.ready_at(&window), Ok(GpsTime::from_seconds(1005)));
    }

    #[test]
    fn test_unrepresentable_offsets_fail() {
        for (key, timing) in &[
            ("wait", "look_left = 1.0\nlook_right = 1.0\nwait = 1e12"),
            ("look_left", "look_left = -1e300\nlook_right = 1.0"),
            ("look_right", "look_left = 1.0\nlook_right = inf"),
        ] {
            let toml = format!(
                "[general]\noutput_dir = \".\"\n\n[flags.\"H1:DMT-ANALYSIS_READY:1\"]\n{}\n",
                timing
            );
            match Config::from_toml(&toml) {
                Err(ConfigError::Invalid { reason, .. }) => {
                    assert!(reason.starts_with(key), "{}", reason)
                }
                other => panic!("{} gave {:?}", timing, other),
            }
        }
    }

    #[test]
    fn test_ready_at_overflow_is_an_error() {
        let timing = Timing {
            look_left: 1.0,
            look_right: 1.0,
            wait: 9.0e9,
        };
        let window = timing.window(GpsTime::from_seconds(1_000_000_000)).unwrap();
        assert_eq!(timing.ready_at(&window), Err(CoverageError::TimeOverflow));
    }
}
