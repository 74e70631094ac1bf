//! Actionable-alert retrieval
//!
//! Pages and counts propagate failures immediately (no retry). Alert
//! content is fetched lazily, one alert at a time, and degrades to an empty
//! string whenever the reply does not have the expected shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::SixgillClient;
use crate::auth::Token;
use crate::error::{HarvestError, HarvestResult};

const ALERTS_PATH: &str = "/alerts/actionable-alert";
const ALERT_COUNT_PATH: &str = "/alerts/actionable_alert/count";
const ALERT_CONTENT_PATH: &str = "/alerts/actionable_alert_content";

/// Content items requested per alert
const CONTENT_LIMIT: u32 = 10_000;

/// Read/unread totals for one organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCount {
    #[serde(default, alias = "read")]
    pub read_count: u64,
    #[serde(default, alias = "unread")]
    pub unread_count: u64,
}

/// Why an alert-content reply could not be unwrapped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentShapeError {
    #[error("reply has no content.items[0]")]
    NoItems,

    #[error("first content item is not an object")]
    ItemNotObject,

    #[error("_source is present but has no text content")]
    SourceWithoutContent,

    #[error("description is not text")]
    DescriptionNotText,
}

/// Pull the text snippet out of an alert-content reply
///
/// Precedence on the first content item:
/// 1. `_source.content` when `_source` is present (no fallback past it)
/// 2. `description`
/// 3. empty string
pub fn extract_content(reply: &Value) -> Result<String, ContentShapeError> {
    let item = reply
        .pointer("/content/items/0")
        .ok_or(ContentShapeError::NoItems)?
        .as_object()
        .ok_or(ContentShapeError::ItemNotObject)?;

    if let Some(source) = item.get("_source") {
        return source
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ContentShapeError::SourceWithoutContent);
    }

    if let Some(description) = item.get("description") {
        return description
            .as_str()
            .map(str::to_string)
            .ok_or(ContentShapeError::DescriptionNotText);
    }

    Ok(String::new())
}

impl SixgillClient {
    /// One page of actionable alerts; the caller drives `offset`
    pub async fn list_alerts(
        &self,
        token: &Token,
        org_id: &str,
        fetch_size: u32,
        offset: u64,
    ) -> HarvestResult<Value> {
        debug!(org_id, fetch_size, offset, "Listing actionable alerts");

        let query = [
            ("organization_id", org_id.to_string()),
            ("fetch_size", fetch_size.to_string()),
            ("offset", offset.to_string()),
        ];
        self.api.get_json_query(token, ALERTS_PATH, &query).await
    }

    /// Read and unread alert totals
    pub async fn count_alerts(&self, token: &Token, org_id: &str) -> HarvestResult<AlertCount> {
        let query = [("organization_id", org_id)];
        self.api.get_json_query(token, ALERT_COUNT_PATH, &query).await
    }

    /// Text snippet of one alert, or `""` when it cannot be extracted
    ///
    /// Non-2xx replies, unparseable bodies and unexpected shapes are logged
    /// and absorbed. Only a request that never got a reply is returned as an
    /// error.
    pub async fn get_alert_content(
        &self,
        token: &Token,
        org_id: &str,
        alert_id: &str,
    ) -> HarvestResult<String> {
        let path = format!("{}/{}", ALERT_CONTENT_PATH, alert_id);
        let query = [
            ("organization_id", org_id.to_string()),
            ("limit", CONTENT_LIMIT.to_string()),
        ];

        let reply: Value = match self.api.get_json_query(token, &path, &query).await {
            Ok(reply) => reply,
            Err(e @ HarvestError::Transport { .. }) => return Err(e),
            Err(e) => {
                warn!(org_id, alert_id, error = %e, "Failed getting content snip");
                return Ok(String::new());
            }
        };

        match extract_content(&reply) {
            Ok(content) => Ok(content),
            Err(e) => {
                warn!(org_id, alert_id, error = %e, "Failed getting content snip");
                Ok(String::new())
            }
        }
    }
}
