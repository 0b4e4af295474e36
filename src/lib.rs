// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub mod alert;
pub mod config;
pub mod coverage;
pub mod jobs;
pub mod labels;
pub mod message;
pub mod query;
pub mod report;
pub mod schedule;
pub mod segments;
pub mod tables;
pub mod time;
pub mod veto;
