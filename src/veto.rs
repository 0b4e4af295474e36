// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Finding the per-IFO, per-category result files of a veto definer query.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::segments::TimeWindow;

#[derive(Error, Debug)]
pub enum VetoError {
    #[error("{0}")]
    Glob(#[from] globset::Error),

    #[error("Unexpected veto file name: {0}")]
    BadFilename(PathBuf),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}

/// Result files keyed by IFO, then by category (e.g. "CAT1").
pub type VetoFiles = BTreeMap<String, BTreeMap<String, Vec<PathBuf>>>;

/// The glob matching a veto query's result files, e.g.
/// "H1-VETOTIME_CAT1-1000-10.json".
pub fn veto_file_glob(window: &TimeWindow) -> String {
    format!(
        "*-VETOTIME_CAT*-{}-{}.json",
        window.start_seconds(),
        window.duration_seconds()
    )
}

/// Split "H1-VETOTIME_CAT1-1000-10.json" into ("H1", "CAT1").
pub fn parse_veto_filename(file: &Path) -> Option<(String, String)> {
    let name = file.file_name()?.to_str()?;
    let mut fields = name.split('-');
    let ifo = fields.next()?;
    let category = fields.next()?.rsplit('_').next()?;
    if ifo.is_empty() || category.is_empty() {
        return None;
    }
    Some((ifo.to_string(), category.to_string()))
}

/// Find and group all result files of a veto query over `window` in `dir`.
pub fn find_veto_files(dir: &Path, window: &TimeWindow) -> Result<VetoFiles, VetoError> {
    let glob = globset::Glob::new(&veto_file_glob(window))?.compile_matcher();
    let mut files: VetoFiles = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?.path();
        let matches = entry
            .file_name()
            .map(|n| glob.is_match(n))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let (ifo, category) =
            parse_veto_filename(&entry).ok_or_else(|| VetoError::BadFilename(entry.clone()))?;
        files
            .entry(ifo)
            .or_default()
            .entry(category)
            .or_default()
            .push(entry);
    }
    // read_dir has no particular order.
    for categories in files.values_mut() {
        for paths in categories.values_mut() {
            paths.sort();
        }
    }
    Ok(files)
}
