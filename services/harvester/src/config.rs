//! Harvester configuration
//!
//! Loaded from a TOML file with one section per upstream credential set plus
//! optional `[http]` and `[endpoints]` sections:
//!
//! ```toml
//! [sixgill]
//! client_id = "..."
//! client_secret = "..."
//!
//! [dnsmonitor]
//! client_id = "..."
//! client_secret = "..."
//!
//! [shodan]
//! key_1 = "..."
//! key_2 = "..."
//!
//! [http]
//! timeout_secs = 30
//! ```
//!
//! Section parameters keep their file order, so positional lookups behave
//! the same way across runs.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::auth::Source;
use crate::error::{HarvestError, HarvestResult};

/// Default request timeout applied to every upstream call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SIXGILL_API: &str = "https://api.cybersixgill.com";
const SIXGILL_TOKEN_URL: &str = "https://api.cybersixgill.com/auth/token/";
const DNSMONITOR_API: &str = "https://dns.argosecure.com/dhs/api";
const DNSMONITOR_TOKEN_URL: &str = "https://argosecure.com/dhs/connect/token";
const SHODAN_API: &str = "https://api.shodan.io";

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Base URLs of every upstream service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub sixgill_api: String,
    pub sixgill_token_url: String,
    pub dnsmonitor_api: String,
    pub dnsmonitor_token_url: String,
    pub shodan_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sixgill_api: SIXGILL_API.to_string(),
            sixgill_token_url: SIXGILL_TOKEN_URL.to_string(),
            dnsmonitor_api: DNSMONITOR_API.to_string(),
            dnsmonitor_token_url: DNSMONITOR_TOKEN_URL.to_string(),
            shodan_api: SHODAN_API.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every upstream at one base URL (local mock servers, proxies)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            sixgill_api: base.to_string(),
            sixgill_token_url: format!("{}/auth/token/", base),
            dnsmonitor_api: format!("{}/dhs/api", base),
            dnsmonitor_token_url: format!("{}/dhs/connect/token", base),
            shodan_api: base.to_string(),
        }
    }
}

/// Client-credential pair used for a token exchange
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Parsed harvester configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Every other section: credential parameters keyed by section name
    #[serde(flatten)]
    sections: toml::Table,
}

impl HarvestConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> HarvestResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> HarvestResult<Self> {
        toml::from_str(content).map_err(|e| HarvestError::Config(e.to_string()))
    }

    /// Ordered `(key, value)` parameters of a section
    ///
    /// Returns `None` when the section is absent. Non-string values are
    /// rendered with their TOML representation.
    pub fn section(&self, name: &str) -> Option<Vec<(String, String)>> {
        let table = self.sections.get(name)?.as_table()?;

        Some(
            table
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect(),
        )
    }

    /// Client credentials for a token-exchanging upstream
    ///
    /// `client_id` and `client_secret` are looked up by name. A section that
    /// names neither falls back to its first two parameters, in file order.
    pub fn client_credentials(&self, source: Source) -> HarvestResult<ClientCredentials> {
        let params = self
            .section(source.section())
            .ok_or_else(|| HarvestError::auth(source, format!("Section {} not found", source.section())))?;

        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let (client_id, client_secret) = match (lookup("client_id"), lookup("client_secret")) {
            (Some(id), Some(secret)) => (id, secret),
            (None, None) if params.len() >= 2 => (params[0].1.clone(), params[1].1.clone()),
            _ => {
                return Err(HarvestError::auth(
                    source,
                    format!("Section {} is missing client_id/client_secret", source.section()),
                ))
            }
        };

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(HarvestError::auth(source, "Empty client credentials"));
        }

        Ok(ClientCredentials {
            client_id,
            client_secret,
        })
    }

    /// Every API key configured for the internet-scanning service, in file order
    pub fn shodan_keys(&self) -> HarvestResult<Vec<String>> {
        let params = self
            .section("shodan")
            .ok_or_else(|| HarvestError::Config("Section shodan not found".to_string()))?;

        Ok(params.into_iter().map(|(_, value)| value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[sixgill]
client_id = "six-id"
client_secret = "six-secret"

[dnsmonitor]
id = "dns-id"
secret = "dns-secret"

[shodan]
primary = "key-a"
backup = "key-b"
spare = "key-c"

[http]
timeout_secs = 12
"#;

    #[test]
    fn test_credentials_by_name() {
        let config = HarvestConfig::from_toml_str(SAMPLE).unwrap();
        let creds = config.client_credentials(Source::Sixgill).unwrap();

        assert_eq!(creds.client_id, "six-id");
        assert_eq!(creds.client_secret, "six-secret");
    }

    #[test]
    fn test_credentials_fall_back_to_position() {
        let config = HarvestConfig::from_toml_str(SAMPLE).unwrap();
        let creds = config.client_credentials(Source::DnsMonitor).unwrap();

        assert_eq!(creds.client_id, "dns-id");
        assert_eq!(creds.client_secret, "dns-secret");
    }

    #[test]
    fn test_missing_section_is_auth_error() {
        let config = HarvestConfig::from_toml_str("[shodan]\nk = \"v\"\n").unwrap();
        let err = config.client_credentials(Source::Sixgill).unwrap_err();

        assert!(matches!(err, HarvestError::Auth { upstream: Source::Sixgill, .. }));
    }

    #[test]
    fn test_incomplete_credentials_rejected() {
        let config = HarvestConfig::from_toml_str("[sixgill]\nclient_id = \"only\"\n").unwrap();
        assert!(config.client_credentials(Source::Sixgill).is_err());
    }

    #[test]
    fn test_shodan_keys_keep_file_order() {
        let config = HarvestConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.shodan_keys().unwrap(), vec!["key-a", "key-b", "key-c"]);
    }

    #[test]
    fn test_http_and_endpoint_defaults() {
        let config = HarvestConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.http.timeout(), Duration::from_secs(12));
        assert_eq!(config.endpoints.sixgill_api, SIXGILL_API);

        let empty = HarvestConfig::from_toml_str("").unwrap();
        assert_eq!(empty.http.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(empty.section("sixgill").is_none());
    }

    #[test]
    fn test_endpoint_overrides() {
        let config = HarvestConfig::from_toml_str(
            "[endpoints]\nsixgill_api = \"http://localhost:9000\"\n",
        )
        .unwrap();

        assert_eq!(config.endpoints.sixgill_api, "http://localhost:9000");
        assert_eq!(config.endpoints.dnsmonitor_api, DNSMONITOR_API);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = HarvestConfig::load(file.path()).unwrap();
        assert!(config.section("sixgill").is_some());

        let err = HarvestConfig::load("/nonexistent/harvester.toml").unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }
}
