//! Token Broker
//!
//! Exchanges long-lived client credentials for short-lived bearer tokens.
//! Tokens are never cached: every logical session asks for a fresh one so a
//! long batch run cannot trip over an expired token.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ClientCredentials, Endpoints, HarvestConfig};
use crate::error::{HarvestError, HarvestResult};

/// Scope requested from the DNS-monitor identity provider
const DNSMONITOR_SCOPE: &str = "DNSMonitorAPI";

/// Upstream service a token or credential belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Cyber-threat-intel platform
    Sixgill,
    /// DNS-monitoring platform
    DnsMonitor,
}

impl Source {
    /// Config section holding this source's credentials
    pub fn section(&self) -> &'static str {
        match self {
            Source::Sixgill => "sixgill",
            Source::DnsMonitor => "dnsmonitor",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.section())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sixgill" => Ok(Source::Sixgill),
            "dnsmonitor" => Ok(Source::DnsMonitor),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// Opaque bearer token scoped to one upstream source
///
/// Expiry is controlled upstream and not tracked here.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    source: Source,
    value: String,
}

impl Token {
    pub fn new(source: Source, value: impl Into<String>) -> Self {
        Self {
            source,
            value: value.into(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Credential exchange against each upstream's token endpoint
pub struct TokenBroker {
    http_client: Client,
    config: HarvestConfig,
}

impl TokenBroker {
    pub fn new(config: HarvestConfig) -> HarvestResult<Self> {
        let http_client = Client::builder()
            .timeout(config.http.timeout())
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    /// Request a fresh bearer token for `source`
    ///
    /// One network round trip per call. Missing credentials, a missing config
    /// section, a rejected exchange or a reply without `access_token` all
    /// surface as [`HarvestError::Auth`].
    pub async fn get_token(&self, source: Source) -> HarvestResult<Token> {
        let credentials = self.config.client_credentials(source)?;

        let (url, form) = match source {
            Source::Sixgill => (
                self.config.endpoints.sixgill_token_url.as_str(),
                token_form(&credentials, None),
            ),
            Source::DnsMonitor => (
                self.config.endpoints.dnsmonitor_token_url.as_str(),
                token_form(&credentials, Some(DNSMONITOR_SCOPE)),
            ),
        };

        debug!(%source, url, "Requesting bearer token");

        let response = self
            .http_client
            .post(url)
            .header("Cache-Control", "no-cache")
            .form(&form)
            .send()
            .await
            .map_err(|e| HarvestError::auth(source, format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::auth(
                source,
                format!("Token exchange rejected ({}): {}", status, body),
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::auth(source, format!("Unreadable token response: {}", e)))?;

        let value = token_response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HarvestError::auth(source, "Token response has no access_token"))?;

        info!(%source, "Bearer token issued");

        Ok(Token::new(source, value))
    }
}

fn token_form(credentials: &ClientCredentials, scope: Option<&str>) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("grant_type", "client_credentials".to_string()),
        ("client_id", credentials.client_id.clone()),
        ("client_secret", credentials.client_secret.clone()),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope.to_string()));
    }
    form
}
