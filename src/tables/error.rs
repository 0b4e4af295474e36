// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
 * Error handling for reading segment tables.
 */

use thiserror::Error;

use crate::segments::CoverageError;

#[derive(Error, Debug)]
pub enum TableError {
    /// The document isn't a valid segment table document.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A required member of a JSON document is absent.
    #[error("The document has no '{0}' object")]
    MissingMember(&'static str),

    /// The tables are readable but their contents aren't usable.
    #[error("{0}")]
    Coverage(#[from] CoverageError),

    /// An IO error.
    #[error("{0}")]
    IO(#[from] std::io::Error),
}
