//! Checkpoint store trait and error types

use crate::state::CrawlCursor;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while persisting or reading a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed checkpoint {path}: {source}")]
    Serialization {
        path: String,
        source: serde_json::Error,
    },
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Trait for checkpoint persistence backends
///
/// A store owns a single destination. `save` replaces whatever was there,
/// so at most one cursor is current at any time.
pub trait CheckpointStore {
    /// Persists the cursor, replacing the previous checkpoint
    fn save(&mut self, cursor: &CrawlCursor) -> CheckpointResult<()>;

    /// Reads a cursor back
    ///
    /// # Returns
    ///
    /// * `Ok(Some(cursor))` - A checkpoint was found and parsed
    /// * `Ok(None)` - No checkpoint exists at `path`
    /// * `Err(CheckpointError)` - The file exists but could not be read or parsed
    fn load(&self, path: &Path) -> CheckpointResult<Option<CrawlCursor>>;

    /// Where `save` writes
    fn location(&self) -> &Path;
}
