//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: State machine for the region → comuna → school walk
//! - `CrawlState`: The controller's owned run state (phase, position, records)
//! - `CrawlCursor`: Serializable position used for checkpoints
//! - `ResumePlan`: Skip decisions derived from a saved cursor
//! - `StopSignal`: Cooperative cancellation flag

mod crawl_state;
mod cursor;
mod phase;
mod resume;

// Re-export main types
pub use crawl_state::{CrawlState, StopSignal};
pub use cursor::CrawlCursor;
pub use phase::{CrawlPhase, TerminationOutcome};
pub use resume::ResumePlan;
