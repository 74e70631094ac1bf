//! Threat-intel platform retrieval
//!
//! Every operation borrows a caller-supplied [`Token`](crate::auth::Token)
//! for its duration only; nothing here obtains or caches tokens.
//!
//! - `organizations`: organization listing and per-organization assets
//! - `intel`: single-page intel search
//! - `alerts`: actionable-alert pages, counts and content
//! - `dve`: bulk CVE enrichment and the top-CVE ranking
//! - `leaks`: credential-leak lookups

mod alerts;
mod dve;
mod intel;
mod leaks;
mod organizations;

pub use alerts::{extract_content, AlertCount, ContentShapeError};
pub use dve::{cve_batches, rank_top_cves, TopCve, MAX_CVE_BATCH, TOP_CVE_COUNT};
pub use intel::{IntelPage, IntelQuery, Scroll};
pub use organizations::{collapse_organizations, Organization};

use crate::config::HarvestConfig;
use crate::error::HarvestResult;
use crate::http::ApiClient;
use crate::retry::RetryPolicy;

/// Client for the threat-intel REST API
pub struct SixgillClient {
    api: ApiClient,
    assets_retry: RetryPolicy,
    enrich_retry: RetryPolicy,
}

impl SixgillClient {
    pub fn new(config: &HarvestConfig) -> HarvestResult<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.sixgill_api, &config.http)?,
            assets_retry: RetryPolicy::assets(),
            enrich_retry: RetryPolicy::bulk_enrichment(),
        })
    }

    /// Replace the asset-listing retry policy
    pub fn with_assets_retry(mut self, policy: RetryPolicy) -> Self {
        self.assets_retry = policy;
        self
    }

    /// Replace the bulk-enrichment retry policy
    pub fn with_enrich_retry(mut self, policy: RetryPolicy) -> Self {
        self.enrich_retry = policy;
        self
    }
}
