//! Exception policy and malformed-record collection.
//!
//! Input files in the wild contain bad records. The parser façades decide what to do with
//! them according to an [`ExceptionPolicy`]:
//! - [`ExceptionPolicy::Strict`] - the first malformed field or unclassifiable span is an error
//! - [`ExceptionPolicy::Lenient`] - problems are reported to an [`ErrorCollector`], logged, and
//!   parsing continues
//!
//! # Example
//!
//! ```
//! use flatbeam::error::MalformedField;
//! use flatbeam::policy::ErrorCollector;
//!
//! let mut collector = ErrorCollector::new();
//! collector.add_field_error(MalformedField {
//!     record: 3,
//!     field: "amount".into(),
//!     raw: "12x4".into(),
//!     message: "invalid characters".into(),
//! });
//! assert_eq!(collector.error_count(), 1);
//! let json = collector.to_json().unwrap();
//! assert!(json.contains("amount"));
//! ```

use crate::error::MalformedField;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Error};
use std::path::Path;

/// How a façade reacts to malformed records and unknown record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionPolicy {
    /// Fail on the first problem.
    #[default]
    Strict,
    /// Report problems and keep going.
    Lenient,
}

impl ExceptionPolicy {
    #[must_use]
    pub fn is_lenient(self) -> bool {
        self == Self::Lenient
    }
}

/// What went wrong with one input span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordProblem {
    /// A field failed its length or decoding requirements; the record was still delivered.
    MalformedField(MalformedField),
    /// No record type matched at `position`.
    UnknownRecordType { position: u64 },
    /// Recovery skipped `skipped` characters starting at `position`.
    Skipped { position: u64, skipped: usize },
}

impl fmt::Display for RecordProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedField(e) => write!(f, "{e}"),
            Self::UnknownRecordType { position } => {
                write!(f, "unable to determine record type at byte {position}")
            }
            Self::Skipped { position, skipped } => {
                write!(f, "skipped {skipped} characters of bad input at byte {position}")
            }
        }
    }
}

/// Collects lenient-policy reports for batch inspection.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    problems: Vec<RecordProblem>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem and log it at `warn`.
    pub fn report(&mut self, problem: RecordProblem) {
        warn!("{problem}");
        self.problems.push(problem);
    }

    pub fn add_field_error(&mut self, error: MalformedField) {
        self.report(RecordProblem::MalformedField(error));
    }

    pub fn error_count(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn errors(&self) -> &[RecordProblem] {
        &self.problems
    }

    /// Only the malformed fields, in report order.
    pub fn field_errors(&self) -> impl Iterator<Item = &MalformedField> {
        self.problems.iter().filter_map(|p| match p {
            RecordProblem::MalformedField(e) => Some(e),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.problems.clear();
    }

    /// Export the reports as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.problems)
    }

    /// Write the reports to a file as JSON.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self.to_json().map_err(Error::other)?;
        std::fs::write(path, json)
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCollector({} errors)", self.error_count())
    }
}
