use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Position of the crawl in the region → comuna hierarchy
///
/// Written to the checkpoint file and read back on resume. Matching is done
/// by display label, so two entries sharing a label are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlCursor {
    /// Label of the region being processed
    pub current_region: Option<String>,

    /// Label of the comuna being processed
    pub current_comuna: Option<String>,

    /// Records accumulated when the cursor was taken
    pub records_collected: usize,

    pub timestamp: DateTime<Local>,

    /// Fingerprint of the configuration that produced the checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl CrawlCursor {
    pub fn new(
        current_region: Option<String>,
        current_comuna: Option<String>,
        records_collected: usize,
    ) -> Self {
        Self {
            current_region,
            current_comuna,
            records_collected,
            timestamp: Local::now(),
            config_hash: None,
        }
    }

    /// Attaches the configuration fingerprint
    pub fn with_config_hash(mut self, hash: Option<String>) -> Self {
        self.config_hash = hash;
        self
    }

    /// Short "region / comuna" description for logs
    pub fn position(&self) -> String {
        format!(
            "{} / {}",
            self.current_region.as_deref().unwrap_or("<start>"),
            self.current_comuna.as_deref().unwrap_or("<any>")
        )
    }
}
