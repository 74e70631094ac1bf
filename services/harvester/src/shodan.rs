//! Internet-scanning service key validation

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};

const API_INFO_PATH: &str = "/api-info";

/// Probes scanning-service API keys against the account-info endpoint
pub struct ShodanClient {
    http_client: Client,
    base_url: String,
}

impl ShodanClient {
    pub fn new(config: &HarvestConfig) -> HarvestResult<Self> {
        let http_client = Client::builder()
            .timeout(config.http.timeout())
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.endpoints.shodan_api.trim_end_matches('/').to_string(),
        })
    }

    /// Account info for one key
    pub async fn api_info(&self, key: &str) -> HarvestResult<Value> {
        let url = format!("{}{}", self.base_url, API_INFO_PATH);

        let response = self
            .http_client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| HarvestError::transport(API_INFO_PATH, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HarvestError::transport(API_INFO_PATH, &e))?;

        if !status.is_success() {
            return Err(HarvestError::status(API_INFO_PATH, status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| HarvestError::malformed(API_INFO_PATH, e.to_string()))
    }

    /// Keys that pass the account-info probe, in input order
    ///
    /// Invalid keys are logged and skipped; the batch never fails.
    pub async fn validate_shodan_keys(&self, keys: &[String]) -> Vec<String> {
        let mut valid = Vec::with_capacity(keys.len());

        for (index, key) in keys.iter().enumerate() {
            match self.api_info(key).await {
                Ok(info) => {
                    debug!(index, plan = ?info.get("plan"), "Scanning API key accepted");
                    valid.push(key.clone());
                }
                Err(e) => {
                    error!(index, key = %mask_key(key), error = %e, "Invalid scanning API key");
                }
            }
        }

        info!(valid = valid.len(), total = keys.len(), "Number of valid scanning API keys");
        valid
    }
}

/// Last four characters only
fn mask_key(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("***{}", tail)
}
