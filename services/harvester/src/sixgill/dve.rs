//! CVE enrichment
//!
//! Bulk enrichment accepts at most [`MAX_CVE_BATCH`] identifiers per call.
//! Oversized batches are rejected, never split silently; use
//! [`cve_batches`] or [`SixgillClient::enrich_in_batches`] to chunk a list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::{debug, info};

use super::SixgillClient;
use crate::auth::Token;
use crate::error::{HarvestError, HarvestResult};

const ENRICH_PATH: &str = "/dve_enrich/enrich";
const SUMMARY_PATH: &str = "/dve_enrich/summary";

/// Upstream limit on identifiers per bulk-enrichment call
pub const MAX_CVE_BATCH: usize = 10;

/// Entries kept by the top-CVE ranking
pub const TOP_CVE_COUNT: usize = 10;

/// One row of the top-CVE ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCve {
    pub cve_id: String,
    /// Current (dynamic) platform score
    pub dynamic_rating: Option<f64>,
    /// Static NVD base score
    pub nvd_base_score: Option<f64>,
}

impl TopCve {
    fn from_summary(entry: &Value) -> Self {
        Self {
            cve_id: entry
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            dynamic_rating: entry.pointer("/score/sixgill/current").and_then(Value::as_f64),
            nvd_base_score: entry.pointer("/score/nvd/score").and_then(Value::as_f64),
        }
    }

    fn rank_key(&self) -> f64 {
        self.dynamic_rating.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Sort summary entries by dynamic score (descending) and keep the first ten
///
/// A missing score ranks as negative infinity, so incomplete entries sink
/// to the bottom instead of being dropped. Ties keep their upstream order.
pub fn rank_top_cves(entries: &[Value]) -> Vec<TopCve> {
    let mut ranked: Vec<TopCve> = entries.iter().map(TopCve::from_summary).collect();
    ranked.sort_by(|a, b| b.rank_key().partial_cmp(&a.rank_key()).unwrap_or(Ordering::Equal));
    ranked.truncate(TOP_CVE_COUNT);
    ranked
}

/// Split identifiers into upstream-sized batches
pub fn cve_batches(cve_ids: &[String]) -> impl Iterator<Item = &[String]> {
    cve_ids.chunks(MAX_CVE_BATCH)
}

impl SixgillClient {
    /// Enrichment for at most ten CVE identifiers
    ///
    /// Retried under the bulk-enrichment policy; once the attempts are spent
    /// the last error is returned.
    pub async fn enrich_cves(&self, token: &Token, cve_ids: &[String]) -> HarvestResult<Value> {
        if cve_ids.len() > MAX_CVE_BATCH {
            return Err(HarvestError::BatchTooLarge {
                size: cve_ids.len(),
                limit: MAX_CVE_BATCH,
            });
        }

        let body = json!({
            "filters": {"ids": cve_ids},
            "results_size": cve_ids.len(),
            "from_index": 0,
        });

        debug!(count = cve_ids.len(), "Enriching CVE batch");

        self.enrich_retry
            .run("bulk_cve_enrich", || self.api.post_json(token, ENRICH_PATH, &body))
            .await
    }

    /// Enrich any number of identifiers, one upstream-sized batch per call, in order
    pub async fn enrich_in_batches(&self, token: &Token, cve_ids: &[String]) -> HarvestResult<Vec<Value>> {
        let mut replies = Vec::new();
        for batch in cve_batches(cve_ids) {
            replies.push(self.enrich_cves(token, batch).await?);
        }
        Ok(replies)
    }

    /// Ten highest-rated CVEs from the enrichment summary
    pub async fn top_cves(&self, token: &Token) -> HarvestResult<Vec<TopCve>> {
        let summary: Value = self.api.get_json(token, SUMMARY_PATH).await?;

        let entries = summary
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| HarvestError::malformed(SUMMARY_PATH, "summary has no values array"))?;

        let top = rank_top_cves(entries);
        for cve in &top {
            debug!(cve_id = %cve.cve_id, rating = ?cve.dynamic_rating, "Top CVE");
        }
        info!(count = top.len(), of = entries.len(), "Ranked top CVEs");

        Ok(top)
    }
}
