//! Field coverage statistics for exported records
//!
//! This module computes how many records carry each column, both at the end
//! of a run and on demand from an export already on disk.

use crate::config::OutputConfig;
use crate::model::{Column, SchoolRecord};
use crate::output::read_records;
use crate::state::CrawlCursor;
use crate::storage::CheckpointStore;
use crate::ScraperError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Populated-value counts per column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCoverage {
    total: usize,
    counts: Vec<(Column, usize)>,
}

impl FieldCoverage {
    /// Counts populated values of every page-derived column
    pub fn from_records(records: &[SchoolRecord]) -> Self {
        let counts = Column::ALL
            .iter()
            .filter(|c| !c.is_context())
            .map(|c| (*c, records.iter().filter(|r| r.has(*c)).count()))
            .collect();

        Self {
            total: records.len(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of records with the column populated
    pub fn count(&self, column: Column) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, n)| *n)
            .unwrap_or(self.total)
    }

    pub fn percentage(&self, column: Column) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.count(column) as f64 / self.total as f64) * 100.0
    }

    /// Page-derived columns with their counts, in export order
    pub fn columns(&self) -> &[(Column, usize)] {
        &self.counts
    }
}

/// Logs one coverage line per column
pub fn log_coverage(coverage: &FieldCoverage) {
    if coverage.total() == 0 {
        return;
    }

    tracing::info!("Field coverage over {} records:", coverage.total());
    for (column, count) in coverage.columns() {
        tracing::info!(
            "  {}: {}/{} ({:.1}%)",
            column,
            count,
            coverage.total(),
            coverage.percentage(*column)
        );
    }
}

/// Statistics assembled from the latest export and checkpoint
#[derive(Debug, Clone)]
pub struct ExportStatistics {
    /// Export the records were read from, if any existed
    pub source: Option<PathBuf>,

    /// Coverage of page-derived columns
    pub coverage: FieldCoverage,

    /// Record count per region
    pub records_by_region: BTreeMap<String, usize>,

    /// Number of distinct (region, comuna) pairs with at least one record
    pub comunas_with_records: usize,

    /// Last saved checkpoint
    pub checkpoint: Option<CrawlCursor>,
}

/// Loads statistics from the newest export and the checkpoint store
///
/// The final export is preferred; the intermediate export is used when no
/// final export exists.
///
/// # Returns
///
/// * `Ok(ExportStatistics)` - Statistics, possibly over zero records
/// * `Err(ScraperError)` - An existing export or checkpoint could not be read
pub fn load_statistics(
    output: &OutputConfig,
    store: &dyn CheckpointStore,
) -> Result<ExportStatistics, ScraperError> {
    let source = [&output.export_path, &output.intermediate_export_path]
        .into_iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf);

    let records = match &source {
        Some(path) => read_records(path)?,
        None => Vec::new(),
    };

    let mut records_by_region = BTreeMap::new();
    let mut comunas = BTreeSet::new();
    for record in &records {
        *records_by_region.entry(record.region.clone()).or_insert(0) += 1;
        comunas.insert((record.region.as_str(), record.comuna.as_str()));
    }

    let checkpoint = store.load(store.location())?;

    Ok(ExportStatistics {
        source,
        coverage: FieldCoverage::from_records(&records),
        comunas_with_records: comunas.len(),
        records_by_region,
        checkpoint,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ExportStatistics) {
    println!("=== Harvest Statistics ===\n");

    match &stats.source {
        Some(path) => println!("Export: {}", path.display()),
        None => println!("Export: none found"),
    }
    println!("  Records: {}", stats.coverage.total());
    println!("  Regions: {}", stats.records_by_region.len());
    println!("  Comunas: {}", stats.comunas_with_records);
    println!();

    if !stats.records_by_region.is_empty() {
        println!("Records by Region:");
        for (region, count) in &stats.records_by_region {
            println!("  {}: {}", region, count);
        }
        println!();
    }

    if stats.coverage.total() > 0 {
        println!("Field Coverage:");
        for (column, count) in stats.coverage.columns() {
            println!(
                "  {}: {} ({:.1}%)",
                column,
                count,
                stats.coverage.percentage(*column)
            );
        }
        println!();
    }

    match &stats.checkpoint {
        Some(cursor) => println!(
            "Checkpoint: {} with {} records at {}",
            cursor.position(),
            cursor.records_collected,
            cursor.timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Checkpoint: none"),
    }
}
