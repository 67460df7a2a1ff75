/// Crawl phase definitions for the hierarchical crawl state machine
///
/// The controller walks region → comuna → school. Each comuna attempt replays
/// the full navigation sequence, so the phase cycles
/// `RegionSelected → ComunaSelected → ResultsListed → ExtractingSchool* → ComunaDone`
/// once per comuna.
use std::fmt;

/// Represents the current phase of the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Navigation States =====
    /// On the search page with no region selected
    Idle,

    /// A region is selected and its comunas are available
    RegionSelected,

    /// A comuna is selected and the search is being submitted
    ComunaSelected,

    /// The school result list is rendered
    ResultsListed,

    /// A school's detail page is being extracted
    ExtractingSchool,

    /// Every school of the current comuna has been attempted
    ComunaDone,

    // ===== Terminal States =====
    /// All regions were processed
    CompletedAll,

    /// The user requested a stop
    Interrupted,

    /// An unrecoverable fault ended the crawl
    Failed,
}

impl CrawlPhase {
    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedAll | Self::Interrupted | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Interrupted | Failed) {
            return true;
        }

        match self {
            Idle => matches!(next, RegionSelected | CompletedAll),
            RegionSelected => matches!(next, RegionSelected | ComunaSelected | ComunaDone | Idle),
            ComunaSelected => matches!(next, ResultsListed | ComunaDone),
            ResultsListed => matches!(next, ExtractingSchool | ComunaDone),
            ExtractingSchool => matches!(next, ExtractingSchool | ComunaDone),
            ComunaDone => matches!(next, RegionSelected | Idle),
            CompletedAll | Interrupted | Failed => false,
        }
    }

    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RegionSelected => "region_selected",
            Self::ComunaSelected => "comuna_selected",
            Self::ResultsListed => "results_listed",
            Self::ExtractingSchool => "extracting_school",
            Self::ComunaDone => "comuna_done",
            Self::CompletedAll => "completed_all",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    /// Returns all phases
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::RegionSelected,
            Self::ComunaSelected,
            Self::ResultsListed,
            Self::ExtractingSchool,
            Self::ComunaDone,
            Self::CompletedAll,
            Self::Interrupted,
            Self::Failed,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a run ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Every region was processed and the final export written
    CompletedAll,

    /// A stop was requested; progress was checkpointed
    Interrupted,
}

impl TerminationOutcome {
    /// The terminal phase this outcome corresponds to
    pub fn phase(&self) -> CrawlPhase {
        match self {
            Self::CompletedAll => CrawlPhase::CompletedAll,
            Self::Interrupted => CrawlPhase::Interrupted,
        }
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase())
    }
}
