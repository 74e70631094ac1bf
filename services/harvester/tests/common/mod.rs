//! Shared fixtures for the HTTP contract tests
#![allow(dead_code)]

use harvester::config::Endpoints;
use harvester::{HarvestConfig, Source, Token};
use wiremock::MockServer;

pub const CONFIG: &str = r#"
[sixgill]
client_id = "six-id"
client_secret = "six-secret"

[dnsmonitor]
client_id = "dns-id"
client_secret = "dns-secret"

[shodan]
primary = "good-key"
backup = "bad-key"

[http]
timeout_secs = 5
"#;

/// Test configuration with every upstream pointed at `server`
pub fn config_for(server: &MockServer) -> HarvestConfig {
    let mut config = HarvestConfig::from_toml_str(CONFIG).unwrap();
    config.endpoints = Endpoints::with_base(&server.uri());
    config
}

pub fn sixgill_token() -> Token {
    Token::new(Source::Sixgill, "test-token")
}

pub fn dnsmonitor_token() -> Token {
    Token::new(Source::DnsMonitor, "dns-token")
}
