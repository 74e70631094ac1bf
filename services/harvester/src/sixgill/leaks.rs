//! Credential-leak lookups

use serde_json::Value;
use tracing::debug;

use super::SixgillClient;
use crate::auth::Token;
use crate::error::HarvestResult;

const LEAKS_PATH: &str = "/credentials/leaks";

impl SixgillClient {
    /// Raw credential-leak reply for caller-supplied filters (e.g. `domain`,
    /// `from_date`, `max_results`); no retry
    pub async fn credential_leaks(&self, token: &Token, params: &[(String, String)]) -> HarvestResult<Value> {
        debug!(filters = params.len(), "Querying credential leaks");
        self.api.get_json_query(token, LEAKS_PATH, params).await
    }
}
