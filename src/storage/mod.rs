//! Storage module for persisting crawl progress
//!
//! This module handles checkpoint persistence:
//! - Saving the crawl cursor so an interrupted run can resume
//! - Loading a previously saved cursor

mod json;
mod traits;

pub use json::JsonCheckpointStore;
pub use traits::{CheckpointError, CheckpointResult, CheckpointStore};
