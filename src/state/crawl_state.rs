use crate::model::SchoolRecord;
use crate::state::{CrawlCursor, CrawlPhase};
use crate::ScraperError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable state of one crawl run
///
/// Owned by the controller for the whole run and mutated only at its
/// transition points: phase changes, region/comuna entry, record appends.
#[derive(Debug)]
pub struct CrawlState {
    phase: CrawlPhase,
    current_region: Option<String>,
    current_comuna: Option<String>,
    records: Vec<SchoolRecord>,
    config_hash: Option<String>,
}

impl CrawlState {
    /// Creates an idle state with the given starting records
    pub fn new(records: Vec<SchoolRecord>, config_hash: Option<String>) -> Self {
        Self {
            phase: CrawlPhase::Idle,
            current_region: None,
            current_comuna: None,
            records,
            config_hash,
        }
    }

    /// Creates an idle state positioned at a saved cursor
    ///
    /// Until the crawl moves past the resume point, a checkpoint taken from
    /// this state still points there.
    pub fn resuming(
        cursor: &CrawlCursor,
        records: Vec<SchoolRecord>,
        config_hash: Option<String>,
    ) -> Self {
        Self {
            current_region: cursor.current_region.clone(),
            current_comuna: cursor.current_comuna.clone(),
            ..Self::new(records, config_hash)
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to the next phase, rejecting illegal transitions
    pub fn advance(&mut self, next: CrawlPhase) -> Result<(), ScraperError> {
        if !self.phase.can_transition_to(next) {
            return Err(ScraperError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Records that a region is being processed
    ///
    /// Re-entering the current region keeps the comuna position.
    pub fn enter_region(&mut self, label: &str) {
        if self.current_region.as_deref() != Some(label) {
            self.current_region = Some(label.to_string());
            self.current_comuna = None;
        }
    }

    /// Records that a comuna is being processed
    pub fn enter_comuna(&mut self, label: &str) {
        self.current_comuna = Some(label.to_string());
    }

    pub fn current_region(&self) -> Option<&str> {
        self.current_region.as_deref()
    }

    pub fn current_comuna(&self) -> Option<&str> {
        self.current_comuna.as_deref()
    }

    /// Appends a record and returns the new record count
    pub fn push_record(&mut self, record: SchoolRecord) -> usize {
        self.records.push(record);
        self.records.len()
    }

    pub fn records(&self) -> &[SchoolRecord] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<SchoolRecord> {
        self.records
    }

    /// Snapshot of the current position for the checkpoint store
    pub fn cursor(&self) -> CrawlCursor {
        CrawlCursor::new(
            self.current_region.clone(),
            self.current_comuna.clone(),
            self.records.len(),
        )
        .with_config_hash(self.config_hash.clone())
    }
}

/// Cooperative stop request shared between the signal handler and the crawl
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; the crawl notices at its next check
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
