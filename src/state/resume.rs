use crate::model::Comuna;
use crate::state::CrawlCursor;

/// Decides which parts of the hierarchy a resumed run skips
///
/// Regions before the cursor's region are skipped whole. Inside the matching
/// region, comunas before the cursor's comuna are skipped; from the first
/// matching comuna on, everything is processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePlan {
    region: Option<String>,
    comuna: Option<String>,
    skipping_regions: bool,
    skipping_comunas: bool,
}

impl ResumePlan {
    /// A plan that skips nothing
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Builds a plan from a saved cursor
    ///
    /// A cursor without a region is equivalent to a fresh run. A cursor
    /// without a comuna resumes at the start of its region.
    pub fn from_cursor(cursor: &CrawlCursor) -> Self {
        let Some(region) = cursor.current_region.clone() else {
            return Self::fresh();
        };

        let comuna = cursor.current_comuna.clone();
        Self {
            skipping_regions: true,
            skipping_comunas: comuna.is_some(),
            region: Some(region),
            comuna,
        }
    }

    /// Returns true while any skipping is still pending
    pub fn is_resuming(&self) -> bool {
        self.skipping_regions || self.skipping_comunas
    }

    /// Checks a region label; the first match ends region-level skipping
    pub fn skip_region(&mut self, label: &str) -> bool {
        if !self.skipping_regions {
            return false;
        }

        if self.region.as_deref() == Some(label) {
            self.skipping_regions = false;
            tracing::info!("Resuming from region {}", label);
            false
        } else {
            tracing::info!("Skipping region {}", label);
            true
        }
    }

    /// Prepares comuna skipping for a freshly enumerated comuna list
    ///
    /// If the resume comuna is not among them, it cannot be reached in this
    /// region and comuna skipping is dropped so the region is processed whole.
    pub fn align_comunas(&mut self, comunas: &[Comuna]) {
        if !self.skipping_comunas || self.skipping_regions {
            return;
        }

        let target = self.comuna.as_deref();
        if !comunas.iter().any(|c| Some(c.display_name.as_str()) == target) {
            tracing::warn!(
                "Resume comuna {} not found in this region; processing all {} comunas",
                target.unwrap_or_default(),
                comunas.len()
            );
            self.skipping_comunas = false;
        }
    }

    /// Checks a comuna label; the first match ends all skipping
    pub fn skip_comuna(&mut self, label: &str) -> bool {
        if !self.skipping_comunas {
            return false;
        }

        if self.comuna.as_deref() == Some(label) {
            self.skipping_comunas = false;
            tracing::info!("Resuming from comuna {}", label);
            false
        } else {
            tracing::info!("Skipping comuna {}", label);
            true
        }
    }
}
