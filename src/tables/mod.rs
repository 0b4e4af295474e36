// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * The segment relations handed over by the segment query tools.
 *
 * A query response holds three relations: segment definitions (id to
 * name/instrument/version), segment summaries (when each definition was
 * defined) and segments (when each definition was active). The query tool
 * chain writes these as a JSON document.
 */

pub mod error;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::coverage::{evaluate, FlagReport};
use crate::segments::{CoverageError, GpsTime, Segment, TimeWindow};
pub use error::TableError;

/// The definition name used by flag queries for the flag's own segments.
pub const RESULT_DEFINITION: &str = "RESULT";

/// The definition name of a veto category's combined segments, e.g.
/// "VETO_CAT1".
pub fn veto_category_definition(category: &str) -> String {
    format!("VETO_{}", category)
}

/// A row of the segment definitions relation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SegmentDefinition {
    pub segment_def_id: String,
    #[serde(default)]
    pub ifos: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<u32>,
}

impl SegmentDefinition {
    /// The full flag name, e.g. "H1:DMT-ANALYSIS_READY:1".
    pub fn flag_name(&self) -> String {
        match self.version {
            Some(v) => format!("{}:{}:{}", self.ifos, self.name, v),
            None => format!("{}:{}", self.ifos, self.name),
        }
    }
}

/// A row of either the segment summary or segment relation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SegmentRow {
    pub segment_def_id: String,
    pub start_time: i64,
    #[serde(default)]
    pub start_time_ns: i64,
    pub end_time: i64,
    #[serde(default)]
    pub end_time_ns: i64,
}

impl SegmentRow {
    /// Rows with a nanosecond part outside `[0, 1e9)` are malformed.
    pub fn to_segment(&self) -> Result<Segment, CoverageError> {
        Segment::new(
            GpsTime::try_from_parts(self.start_time, self.start_time_ns)?,
            GpsTime::try_from_parts(self.end_time, self.end_time_ns)?,
            self.segment_def_id.clone(),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SegmentTables {
    pub segment_definer: Vec<SegmentDefinition>,
    pub segment_summary: Vec<SegmentRow>,
    pub segment: Vec<SegmentRow>,
}

impl SegmentTables {
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<T: AsRef<Path>>(file: T) -> Result<Self, TableError> {
        let reader = BufReader::new(File::open(file)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Find the definition named `name`. A missing definition is an error
    /// rather than an empty set, so a misconfigured flag doesn't quietly
    /// report 0% coverage.
    pub fn find_definition(&self, name: &str) -> Result<&SegmentDefinition, CoverageError> {
        self.segment_definer
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CoverageError::DefinitionNotFound {
                name: name.to_string(),
            })
    }

    /// The "defined" segments of a definition.
    pub fn defined_segments(&self, definition_id: &str) -> Result<Vec<Segment>, CoverageError> {
        collect_segments(&self.segment_summary, definition_id)
    }

    /// The "active" segments of a definition.
    pub fn active_segments(&self, definition_id: &str) -> Result<Vec<Segment>, CoverageError> {
        collect_segments(&self.segment, definition_id)
    }

    /// Look up the definition `name` and evaluate its coverage.
    pub fn evaluate_definition(
        &self,
        name: &str,
        window: &TimeWindow,
        reference_time: GpsTime,
    ) -> Result<FlagReport, CoverageError> {
        let definition = self.find_definition(name)?;
        self.evaluate_id(&definition.segment_def_id, window, reference_time)
    }

    pub fn evaluate_id(
        &self,
        definition_id: &str,
        window: &TimeWindow,
        reference_time: GpsTime,
    ) -> Result<FlagReport, CoverageError> {
        let defined = self.defined_segments(definition_id)?;
        let active = self.active_segments(definition_id)?;
        evaluate(window, &defined, &active, reference_time)
    }

    /// All definitions other than `exclude`, sorted by flag name. Used to
    /// break a veto category down into its individual flags.
    pub fn definitions_except(&self, exclude: &str) -> Vec<&SegmentDefinition> {
        let mut definitions: Vec<_> = self
            .segment_definer
            .iter()
            .filter(|d| d.name != exclude)
            .collect();
        definitions.sort_by_key(|d| d.flag_name());
        definitions
    }
}

/// The names of the flags listed in an all-active query result, sorted. The
/// tool writes them as the keys of the "Active Results" object.
pub fn read_active_flags<T: AsRef<Path>>(file: T) -> Result<Vec<String>, TableError> {
    let reader = BufReader::new(File::open(file)?);
    let doc: serde_json::Value = serde_json::from_reader(reader)?;
    let results = doc
        .get(ACTIVE_RESULTS)
        .and_then(serde_json::Value::as_object)
        .ok_or(TableError::MissingMember(ACTIVE_RESULTS))?;
    let mut flags: Vec<String> = results.keys().cloned().collect();
    flags.sort();
    Ok(flags)
}

const ACTIVE_RESULTS: &str = "Active Results";

fn collect_segments(rows: &[SegmentRow], definition_id: &str) -> Result<Vec<Segment>, CoverageError> {
    rows.iter()
        .filter(|r| r.segment_def_id == definition_id)
        .map(SegmentRow::to_segment)
        .collect()
}
