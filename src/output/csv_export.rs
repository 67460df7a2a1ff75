use crate::config::OutputConfig;
use crate::model::{Column, SchoolRecord};
use crate::output::{ExportKind, OutputError, OutputResult, RecordSink};
use std::fs;
use std::path::{Path, PathBuf};

/// Record sink writing one CSV file per export kind
///
/// The header row is always the full canonical column list; absent values
/// are written as empty cells.
#[derive(Debug, Clone)]
pub struct CsvRecordSink {
    final_path: PathBuf,
    intermediate_path: PathBuf,
    pilot_path: PathBuf,
}

impl CsvRecordSink {
    pub fn new(
        final_path: impl Into<PathBuf>,
        intermediate_path: impl Into<PathBuf>,
        pilot_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            final_path: final_path.into(),
            intermediate_path: intermediate_path.into(),
            pilot_path: pilot_path.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            &config.export_path,
            &config.intermediate_export_path,
            &config.pilot_export_path,
        )
    }

    /// Destination of an export kind
    pub fn path_for(&self, kind: ExportKind) -> &Path {
        match kind {
            ExportKind::Intermediate => &self.intermediate_path,
            ExportKind::Final => &self.final_path,
            ExportKind::Pilot => &self.pilot_path,
        }
    }
}

impl RecordSink for CsvRecordSink {
    fn export(
        &mut self,
        records: &[SchoolRecord],
        kind: ExportKind,
    ) -> OutputResult<Option<PathBuf>> {
        if records.is_empty() {
            tracing::warn!("No records to export ({})", kind);
            return Ok(None);
        }

        let path = self.path_for(kind).to_path_buf();
        write_records(&path, records)?;
        tracing::info!(
            "Exported {} records to {} ({})",
            records.len(),
            path.display(),
            kind
        );
        Ok(Some(path))
    }

    fn restore(&self, kind: ExportKind) -> OutputResult<Vec<SchoolRecord>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_records(path)
    }
}

/// Writes records to `path` through a temp file and a rename
pub fn write_records(path: &Path, records: &[SchoolRecord]) -> OutputResult<()> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    let temp = path.with_file_name(name);

    {
        let mut writer = csv::Writer::from_path(&temp)?;
        writer.write_record(Column::ALL.iter().map(|c| c.header()))?;
        for record in records {
            writer.write_record(record.row())?;
        }
        writer.flush().map_err(|source| OutputError::Io {
            path: temp.display().to_string(),
            source,
        })?;
    }

    fs::rename(&temp, path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Reads records from a CSV export
///
/// Columns are matched by header name, so reordered files still load. Every
/// canonical column must be present.
pub fn read_records(path: &Path) -> OutputResult<Vec<SchoolRecord>> {
    let file = fs::File::open(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let mut positions = Vec::with_capacity(Column::ALL.len());
    for column in Column::ALL {
        let index = headers
            .iter()
            .position(|h| Column::from_header(h) == Some(column))
            .ok_or_else(|| OutputError::MissingColumn(column.header().to_string()))?;
        positions.push((column, index));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = SchoolRecord::default();
        for (column, index) in &positions {
            record.set(*column, row.get(*index).map(str::to_string));
        }
        records.push(record);
    }

    tracing::debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
