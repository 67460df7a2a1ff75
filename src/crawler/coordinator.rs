//! Crawl controller - hierarchical crawl orchestration
//!
//! This module contains the main crawl loop, which:
//! - Enumerates regions, then the comunas of each region
//! - Replays the full search navigation for every comuna
//! - Extracts every school of the result list
//! - Checkpoints and exports on a record-count schedule
//! - Preserves progress on interruption and on fatal faults

use crate::browser::{DomDriver, DriverError, DriverResult};
use crate::config::Config;
use crate::crawler::SiteNavigator;
use crate::extract::SchoolExtractor;
use crate::model::{Comuna, Region, SchoolRecord};
use crate::output::{log_coverage, CsvRecordSink, ExportKind, FieldCoverage, RecordSink};
use crate::state::{
    CrawlCursor, CrawlPhase, CrawlState, ResumePlan, StopSignal, TerminationOutcome,
};
use crate::storage::{CheckpointStore, JsonCheckpointStore};
use crate::ScraperError;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How much of the hierarchy a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlScope {
    /// Every region and comuna
    #[default]
    Full,

    /// First region, first comuna; no checkpoints, pilot export file
    Pilot,
}

/// Run options that do not belong in the configuration file
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Checkpoint to resume from
    pub resume: Option<PathBuf>,

    pub scope: CrawlScope,

    /// Polled between crawl steps
    pub stop: StopSignal,
}

/// Counts of what a run did and skipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    pub regions_processed: usize,
    pub regions_skipped: usize,
    pub comunas_processed: usize,
    pub comunas_skipped: usize,
    pub schools_extracted: usize,
    pub schools_failed: usize,
}

/// Result of a run that did not fail
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub outcome: TerminationOutcome,

    /// Every record held at the end, carried-over ones included
    pub records: Vec<SchoolRecord>,

    pub counters: CrawlCounters,

    /// Artifact written at termination, if there was anything to export
    pub export_path: Option<PathBuf>,

    pub elapsed: Duration,
}

/// The crawl controller
///
/// Owns the driver, the run state, and its persistence collaborators for
/// the lifetime of one run.
pub struct Crawler<D: DomDriver> {
    driver: D,
    config: Config,
    options: CrawlOptions,
    navigator: SiteNavigator,
    extractor: SchoolExtractor,
    checkpoints: Box<dyn CheckpointStore>,
    sink: Box<dyn RecordSink>,
    config_hash: String,
    counters: CrawlCounters,
}

impl<D: DomDriver> Crawler<D> {
    /// Creates a crawler with the file-backed checkpoint store and CSV sink
    ///
    /// # Arguments
    ///
    /// * `driver` - An open browser session
    /// * `config` - The validated configuration
    /// * `options` - Resume source, scope, and stop signal
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(ScraperError)` - The site configuration could not be compiled
    pub fn new(driver: D, config: Config, options: CrawlOptions) -> Result<Self, ScraperError> {
        let navigator = SiteNavigator::new(config.site.clone())?
            .with_wait_timeout(Duration::from_secs(config.browser.wait_timeout_secs));
        let extractor = SchoolExtractor::from_config(&config);
        let checkpoints = Box::new(JsonCheckpointStore::new(&config.output.checkpoint_path));
        let sink = Box::new(CsvRecordSink::from_config(&config.output));
        let config_hash = config.fingerprint()?;

        Ok(Self {
            driver,
            config,
            options,
            navigator,
            extractor,
            checkpoints,
            sink,
            config_hash,
            counters: CrawlCounters::default(),
        })
    }

    /// Replaces the checkpoint store
    pub fn with_checkpoint_store(mut self, store: Box<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    /// Replaces the record sink
    pub fn with_record_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs the crawl to a terminal state
    ///
    /// The driver session is released before this returns, whatever the
    /// outcome. A fatal fault is returned as an error after the cursor and an
    /// intermediate export were written.
    pub fn run(mut self) -> Result<CrawlReport, ScraperError> {
        let started = Instant::now();
        let result = self.execute(started);

        if let Err(e) = self.driver.quit() {
            tracing::warn!("Failed to close browser session: {}", e);
        }
        result
    }

    fn execute(&mut self, started: Instant) -> Result<CrawlReport, ScraperError> {
        let (mut plan, mut state) = self.prepare_resume()?;

        let outcome = match self.crawl(&mut state, &mut plan) {
            Ok(outcome) => outcome,
            Err(e) if self.options.stop.is_triggered() => {
                tracing::info!("Fault after stop request treated as interruption: {}", e);
                state.advance(CrawlPhase::Interrupted)?;
                TerminationOutcome::Interrupted
            }
            Err(e) => {
                tracing::error!("Fatal fault during crawl: {}", e);
                self.preserve_after_fault(&state);
                if let Err(transition) = state.advance(CrawlPhase::Failed) {
                    tracing::debug!("{}", transition);
                }
                return Err(e);
            }
        };

        let export_path = match outcome {
            TerminationOutcome::CompletedAll => {
                if plan.is_resuming() {
                    tracing::warn!("Resume point was never reached; nothing was re-crawled");
                }
                tracing::info!("Crawl completed. Total schools: {}", state.record_count());
                self.sink.export(state.records(), self.completion_export())?
            }
            TerminationOutcome::Interrupted => {
                tracing::info!(
                    "Crawl interrupted by user with {} records",
                    state.record_count()
                );
                self.preserve(&state)?
            }
        };

        log_coverage(&FieldCoverage::from_records(state.records()));

        Ok(CrawlReport {
            outcome,
            records: state.into_records(),
            counters: self.counters,
            export_path,
            elapsed: started.elapsed(),
        })
    }

    /// Walks every region; returns `Interrupted` as soon as a stop is seen
    fn crawl(
        &mut self,
        state: &mut CrawlState,
        plan: &mut ResumePlan,
    ) -> Result<TerminationOutcome, ScraperError> {
        self.navigator.open_search_page(&mut self.driver)?;
        let mut regions = self.navigator.regions(&mut self.driver)?;
        if self.is_pilot() {
            regions.truncate(1);
        }

        for region in &regions {
            if self.options.stop.is_triggered() {
                state.advance(CrawlPhase::Interrupted)?;
                return Ok(TerminationOutcome::Interrupted);
            }
            if plan.skip_region(&region.display_name) {
                continue;
            }

            if let ControlFlow::Break(outcome) = self.crawl_region(state, plan, region)? {
                state.advance(outcome.phase())?;
                return Ok(outcome);
            }
        }

        state.advance(CrawlPhase::CompletedAll)?;
        Ok(TerminationOutcome::CompletedAll)
    }

    fn crawl_region(
        &mut self,
        state: &mut CrawlState,
        plan: &mut ResumePlan,
        region: &Region,
    ) -> Result<ControlFlow<TerminationOutcome>, ScraperError> {
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("Processing region: {}", region.display_name);
        tracing::info!("{}", "=".repeat(60));
        state.enter_region(&region.display_name);

        let selected = self.reselect_region(region);
        if tolerate(selected, "Selecting region")?.is_none() {
            self.counters.regions_skipped += 1;
            return Ok(ControlFlow::Continue(()));
        }
        state.advance(CrawlPhase::RegionSelected)?;

        let listed = self.navigator.comunas(&mut self.driver);
        let mut comunas = tolerate(listed, "Listing comunas")?.unwrap_or_default();
        if self.is_pilot() {
            comunas.truncate(1);
        }
        plan.align_comunas(&comunas);

        for comuna in &comunas {
            if self.options.stop.is_triggered() {
                return Ok(ControlFlow::Break(TerminationOutcome::Interrupted));
            }
            if plan.skip_comuna(&comuna.display_name) {
                continue;
            }

            if let ControlFlow::Break(outcome) = self.crawl_comuna(state, region, comuna)? {
                return Ok(ControlFlow::Break(outcome));
            }
        }

        state.advance(CrawlPhase::Idle)?;
        self.counters.regions_processed += 1;
        tracing::info!("Region {} completed", region.display_name);
        Ok(ControlFlow::Continue(()))
    }

    fn crawl_comuna(
        &mut self,
        state: &mut CrawlState,
        region: &Region,
        comuna: &Comuna,
    ) -> Result<ControlFlow<TerminationOutcome>, ScraperError> {
        tracing::info!("Processing comuna: {}", comuna.display_name);
        state.enter_comuna(&comuna.display_name);

        // The result list replaces the form, so each comuna starts over
        let reselected = self.reselect_region(region);
        if tolerate(reselected, "Re-selecting region")?.is_none() {
            return self.skip_comuna(state, comuna);
        }
        state.advance(CrawlPhase::RegionSelected)?;

        let searched = self.navigator.search_comuna(&mut self.driver, comuna);
        if tolerate(searched, "Searching comuna")?.is_none() {
            return self.skip_comuna(state, comuna);
        }
        state.advance(CrawlPhase::ComunaSelected)?;

        let listed = self.navigator.school_references(&mut self.driver);
        let references = tolerate(listed, "Listing schools")?.unwrap_or_default();
        state.advance(CrawlPhase::ResultsListed)?;

        let total = references.len();
        for (index, reference) in references.iter().enumerate() {
            if self.options.stop.is_triggered() {
                return Ok(ControlFlow::Break(TerminationOutcome::Interrupted));
            }

            tracing::info!("Processing school {}/{}", index + 1, total);
            state.advance(CrawlPhase::ExtractingSchool)?;

            let extracted = self.extractor.extract(
                &mut self.driver,
                reference,
                &region.display_name,
                &comuna.display_name,
            );
            match extracted {
                Ok(record) => {
                    self.counters.schools_extracted += 1;
                    let count = state.push_record(record);
                    if self.is_checkpoint_due(count) {
                        self.checkpoint(state)?;
                    }
                }
                Err(e) if e.is_session_lost() => return Err(e.into()),
                Err(e) => {
                    self.counters.schools_failed += 1;
                    tracing::error!("Skipping school {}: {}", reference.url, e);
                }
            }
        }

        state.advance(CrawlPhase::ComunaDone)?;
        self.counters.comunas_processed += 1;
        tracing::info!(
            "Comuna {} completed. Total records: {}",
            comuna.display_name,
            state.record_count()
        );
        Ok(ControlFlow::Continue(()))
    }

    fn skip_comuna(
        &mut self,
        state: &mut CrawlState,
        comuna: &Comuna,
    ) -> Result<ControlFlow<TerminationOutcome>, ScraperError> {
        self.counters.comunas_skipped += 1;
        tracing::warn!("Skipping comuna {}", comuna.display_name);
        if state.phase() != CrawlPhase::ComunaDone {
            state.advance(CrawlPhase::ComunaDone)?;
        }
        Ok(ControlFlow::Continue(()))
    }

    fn reselect_region(&mut self, region: &Region) -> DriverResult<()> {
        self.navigator.open_search_page(&mut self.driver)?;
        self.navigator.select_region(&mut self.driver, region)
    }

    fn is_pilot(&self) -> bool {
        self.options.scope == CrawlScope::Pilot
    }

    fn is_checkpoint_due(&self, count: usize) -> bool {
        !self.is_pilot() && count.checked_rem(self.config.crawl.checkpoint_interval) == Some(0)
    }

    fn completion_export(&self) -> ExportKind {
        if self.is_pilot() {
            ExportKind::Pilot
        } else {
            ExportKind::Final
        }
    }

    fn abnormal_export(&self) -> ExportKind {
        if self.is_pilot() {
            ExportKind::Pilot
        } else {
            ExportKind::Intermediate
        }
    }

    /// Saves the cursor and writes the intermediate export
    fn checkpoint(&mut self, state: &CrawlState) -> Result<(), ScraperError> {
        self.checkpoints.save(&state.cursor())?;
        self.sink.export(state.records(), ExportKind::Intermediate)?;
        Ok(())
    }

    /// Persists progress at an abnormal termination
    ///
    /// Pilot runs never write the checkpoint; their records go to the pilot
    /// export.
    fn preserve(&mut self, state: &CrawlState) -> Result<Option<PathBuf>, ScraperError> {
        if !self.is_pilot() {
            self.checkpoints.save(&state.cursor())?;
        }
        Ok(self.sink.export(state.records(), self.abnormal_export())?)
    }

    /// Like `preserve`, but failures are only logged so the original fault wins
    fn preserve_after_fault(&mut self, state: &CrawlState) {
        if let Err(e) = self.preserve(state) {
            tracing::error!("Failed to preserve progress: {}", e);
        }
    }

    /// Loads the resume cursor and builds the starting state from it
    ///
    /// A missing checkpoint means a fresh run. A malformed one is an error,
    /// raised before anything could overwrite it. The resumed state starts at
    /// the cursor's position so an early stop saves the same resume point.
    fn prepare_resume(&mut self) -> Result<(ResumePlan, CrawlState), ScraperError> {
        let hash = Some(self.config_hash.clone());
        let fresh = || (ResumePlan::fresh(), CrawlState::new(Vec::new(), hash.clone()));

        let Some(path) = self.options.resume.clone() else {
            return Ok(fresh());
        };

        let Some(cursor) = self.checkpoints.load(&path)? else {
            tracing::info!("No checkpoint at {}, starting fresh", path.display());
            return Ok(fresh());
        };

        tracing::info!(
            "Resuming from {} ({} records collected at {})",
            cursor.position(),
            cursor.records_collected,
            cursor.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        match cursor.config_hash.as_deref() {
            Some(saved) if saved != self.config_hash => {
                tracing::warn!("Checkpoint was written with a different configuration");
            }
            _ => {}
        }

        let Some(region) = cursor.current_region.clone() else {
            return Ok(fresh());
        };
        let plan = ResumePlan::from_cursor(&cursor);
        let records = self.carried_records(&cursor, &region);

        Ok((plan, CrawlState::resuming(&cursor, records, hash)))
    }

    /// Records from the intermediate export that the resumed run keeps
    ///
    /// Rows of the in-progress comuna are dropped since it is crawled again.
    /// An export that disagrees with the cursor's count is not trusted.
    fn carried_records(&self, cursor: &CrawlCursor, region: &str) -> Vec<SchoolRecord> {
        let previous = match self.sink.restore(ExportKind::Intermediate) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not reload previous records: {}", e);
                return Vec::new();
            }
        };
        if previous.len() != cursor.records_collected {
            tracing::warn!(
                "Intermediate export has {} rows but the checkpoint recorded {}; starting with no records",
                previous.len(),
                cursor.records_collected
            );
            return Vec::new();
        }

        let comuna = cursor.current_comuna.as_deref();
        let records: Vec<SchoolRecord> = previous
            .into_iter()
            .filter(|r| !(r.region == region && comuna.map_or(true, |c| r.comuna == c)))
            .collect();
        tracing::info!("Carried over {} records", records.len());
        records
    }
}

/// Downgrades a navigation fault to `None`; a lost session stays an error
fn tolerate<T>(result: DriverResult<T>, step: &str) -> Result<Option<T>, DriverError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_session_lost() => Err(e),
        Err(e) => {
            tracing::error!("{} failed: {}", step, e);
            Ok(None)
        }
    }
}
