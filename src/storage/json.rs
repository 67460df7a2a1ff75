use crate::state::CrawlCursor;
use crate::storage::{CheckpointError, CheckpointResult, CheckpointStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Checkpoint store backed by a single pretty-printed JSON file
///
/// Saves go through a sibling temp file and a rename, so a reader never sees
/// a half-written checkpoint.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&mut self, cursor: &CrawlCursor) -> CheckpointResult<()> {
        let display = self.path.display().to_string();
        let json = serde_json::to_string_pretty(cursor).map_err(|source| {
            CheckpointError::Serialization {
                path: display.clone(),
                source,
            }
        })?;

        let temp = self.temp_path();
        fs::write(&temp, json)
            .and_then(|_| fs::rename(&temp, &self.path))
            .map_err(|source| CheckpointError::Io {
                path: display,
                source,
            })?;

        tracing::info!(
            "Progress saved: {} ({} records)",
            cursor.position(),
            cursor.records_collected
        );
        Ok(())
    }

    fn load(&self, path: &Path) -> CheckpointResult<Option<CrawlCursor>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let cursor = serde_json::from_str(&content).map_err(|source| {
            CheckpointError::Serialization {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(Some(cursor))
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
