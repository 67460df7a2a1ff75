//! Output module for exporting harvested records
//!
//! This module handles:
//! - Writing the record set to CSV with the canonical column order
//! - Reading a previous export back for resumed runs
//! - Field coverage statistics

mod csv_export;
pub mod stats;
mod traits;

pub use csv_export::{read_records, write_records, CsvRecordSink};
pub use stats::{load_statistics, log_coverage, print_statistics, ExportStatistics, FieldCoverage};
pub use traits::{ExportKind, OutputError, OutputResult, RecordSink};
