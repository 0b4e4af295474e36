// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Posting messages and labels for an event.
 *
 * Talking to the event tracker is someone else's job; a [Reporter] either
 * only logs what would be posted, or queues records in an outbox file for an
 * uploader to forward.
 */

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every message carries this tag, so this workflow's posts can be found.
pub const COMMON_TAG: &str = "segDb2grcDb";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}

pub trait Reporter: Send + Sync {
    /// Post a log message, optionally attaching a file. [COMMON_TAG] is added
    /// to `tags`.
    fn write_log(
        &self,
        message: &str,
        attachment: Option<&Path>,
        tags: &[String],
    ) -> Result<(), ReportError>;

    /// Apply labels. Labels already on the event are harmless.
    fn write_labels(&self, labels: &BTreeSet<String>) -> Result<(), ReportError>;
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn write_log(
        &self,
        message: &str,
        attachment: Option<&Path>,
        tags: &[String],
    ) -> Result<(), ReportError> {
        (**self).write_log(message, attachment, tags)
    }

    fn write_labels(&self, labels: &BTreeSet<String>) -> Result<(), ReportError> {
        (**self).write_labels(labels)
    }
}

fn with_common_tag(tags: &[String]) -> Vec<String> {
    let mut all = Vec::with_capacity(tags.len() + 1);
    all.push(COMMON_TAG.to_string());
    all.extend(tags.iter().cloned());
    all
}

/// One queued post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Log {
        graceid: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        filename: Option<PathBuf>,
        tags: Vec<String>,
    },
    Label {
        graceid: String,
        label: String,
    },
}

/// Nothing leaves this process; posts are only logged.
pub struct LogReporter {
    graceid: String,
}

impl LogReporter {
    pub fn new<T: Into<String>>(graceid: T) -> Self {
        LogReporter {
            graceid: graceid.into(),
        }
    }
}

impl Reporter for LogReporter {
    fn write_log(
        &self,
        message: &str,
        attachment: Option<&Path>,
        tags: &[String],
    ) -> Result<(), ReportError> {
        let tags = with_common_tag(tags);
        match attachment {
            Some(f) => info!(
                "{} [{}] {} (attaching {})",
                self.graceid,
                tags.join(","),
                message,
                f.display()
            ),
            None => info!("{} [{}] {}", self.graceid, tags.join(","), message),
        }
        Ok(())
    }

    fn write_labels(&self, labels: &BTreeSet<String>) -> Result<(), ReportError> {
        for label in labels {
            info!("{} label {}", self.graceid, label);
        }
        Ok(())
    }
}

/// Appends one JSON [Record] per line to an outbox file.
pub struct OutboxReporter {
    graceid: String,
    file: Mutex<File>,
}

impl OutboxReporter {
    pub fn new<T: Into<String>, P: AsRef<Path>>(graceid: T, outbox: P) -> Result<Self, ReportError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(outbox)?;
        Ok(OutboxReporter {
            graceid: graceid.into(),
            file: Mutex::new(file),
        })
    }

    fn append(&self, record: &Record) -> Result<(), ReportError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl Reporter for OutboxReporter {
    fn write_log(
        &self,
        message: &str,
        attachment: Option<&Path>,
        tags: &[String],
    ) -> Result<(), ReportError> {
        self.append(&Record::Log {
            graceid: self.graceid.clone(),
            message: message.to_string(),
            filename: attachment.map(Path::to_path_buf),
            tags: with_common_tag(tags),
        })
    }

    fn write_labels(&self, labels: &BTreeSet<String>) -> Result<(), ReportError> {
        for label in labels {
            self.append(&Record::Label {
                graceid: self.graceid.clone(),
                label: label.clone(),
            })?;
        }
        Ok(())
    }
}

/// Read back an outbox file.
pub fn read_outbox<T: AsRef<Path>>(outbox: T) -> Result<Vec<Record>, ReportError> {
    let contents = std::fs::read_to_string(outbox)?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(ReportError::from))
        .collect()
}
