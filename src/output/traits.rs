//! Record sink traits and types
//!
//! This module defines the trait interface for record exporters and the
//! kinds of export the crawl controller requests.

use crate::model::SchoolRecord;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export is missing column: {0}")]
    MissingColumn(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Which artifact an export writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Written at checkpoints and on abnormal termination
    Intermediate,

    /// Written only when every region was processed
    Final,

    /// Written by a pilot run
    Pilot,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intermediate => "intermediate",
            Self::Final => "final",
            Self::Pilot => "pilot",
        };
        write!(f, "{}", name)
    }
}

/// Trait for record exporters
///
/// Sinks are passive: the controller decides when to export and always
/// passes the full record set, which replaces the artifact's contents.
pub trait RecordSink {
    /// Writes every record to the artifact for `kind`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(path))` - The artifact that was written
    /// * `Ok(None)` - Nothing was written because `records` is empty
    /// * `Err(OutputError)` - The artifact could not be written
    fn export(&mut self, records: &[SchoolRecord], kind: ExportKind)
        -> OutputResult<Option<PathBuf>>;

    /// Reads back the records of a previously written artifact
    ///
    /// A missing artifact yields an empty list.
    fn restore(&self, kind: ExportKind) -> OutputResult<Vec<SchoolRecord>>;
}
