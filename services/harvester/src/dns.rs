//! DNS Resolution Helper
//!
//! NS, MX and address lookups for one candidate domain. Each lookup fails
//! independently: a failure empties that field only and is never returned.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::warn;

use crate::error::{HarvestError, HarvestResult};

/// Record lookups used by [`resolve`]
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Name-server targets
    async fn name_servers(&self, domain: &str) -> HarvestResult<Vec<String>>;

    /// Mail-exchanger hosts
    async fn mail_exchangers(&self, domain: &str) -> HarvestResult<Vec<String>>;

    /// One address from standard hostname resolution
    async fn host_address(&self, domain: &str) -> HarvestResult<IpAddr>;
}

/// Lookups against the system-configured resolvers
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new() -> HarvestResult<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| HarvestError::Config(format!("Failed to read system resolver config: {}", e)))?;
        Ok(Self { resolver })
    }
}

fn lookup_failed(domain: &str, record: &str, err: impl std::fmt::Display) -> HarvestError {
    HarvestError::Upstream {
        endpoint: format!("dns:{}/{}", domain, record),
        status: None,
        message: err.to_string(),
    }
}

#[async_trait]
impl DnsLookup for SystemResolver {
    async fn name_servers(&self, domain: &str) -> HarvestResult<Vec<String>> {
        let lookup = self
            .resolver
            .ns_lookup(domain)
            .await
            .map_err(|e| lookup_failed(domain, "NS", e))?;
        Ok(lookup.iter().map(|ns| ns.to_string()).collect())
    }

    async fn mail_exchangers(&self, domain: &str) -> HarvestResult<Vec<String>> {
        let lookup = self
            .resolver
            .mx_lookup(domain)
            .await
            .map_err(|e| lookup_failed(domain, "MX", e))?;
        Ok(lookup.iter().map(|mx| mx.exchange().to_string()).collect())
    }

    async fn host_address(&self, domain: &str) -> HarvestResult<IpAddr> {
        let mut addrs = tokio::net::lookup_host((domain, 0))
            .await
            .map_err(|e| lookup_failed(domain, "A", e))?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| lookup_failed(domain, "A", "no addresses"))
    }
}

/// Independently resolved records for one domain
///
/// At most one of `ipv4`/`ipv6` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordSet {
    pub mx: Vec<String>,
    pub ns: Vec<String>,
    pub ipv4: String,
    pub ipv6: String,
}

/// Flat rendering of a [`DnsRecordSet`] with MX/NS as bracketed string lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatDnsRecord {
    pub mx: String,
    pub ns: String,
    pub ipv4: String,
    pub ipv6: String,
}

impl DnsRecordSet {
    pub fn to_flat(&self) -> FlatDnsRecord {
        FlatDnsRecord {
            mx: bracketed_list(&self.mx),
            ns: bracketed_list(&self.ns),
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone(),
        }
    }
}

/// `['a', 'b']`, or `[]` when empty
fn bracketed_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{}'", item)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Resolve NS, MX and one address for `domain`
///
/// Never fails: an unresolvable domain yields every field empty.
pub async fn resolve(lookup: &dyn DnsLookup, domain: &str) -> DnsRecordSet {
    let ns = lookup.name_servers(domain).await.unwrap_or_else(|e| {
        warn!(domain, record = "NS", error = %e, "DNS lookup failed");
        Vec::new()
    });

    let mx = lookup.mail_exchangers(domain).await.unwrap_or_else(|e| {
        warn!(domain, record = "MX", error = %e, "DNS lookup failed");
        Vec::new()
    });

    let (ipv4, ipv6) = match lookup.host_address(domain).await {
        Ok(IpAddr::V6(addr)) => (String::new(), addr.to_string()),
        Ok(IpAddr::V4(addr)) => (addr.to_string(), String::new()),
        Err(e) => {
            warn!(domain, record = "A", error = %e, "DNS lookup failed");
            (String::new(), String::new())
        }
    };

    DnsRecordSet { mx, ns, ipv4, ipv6 }
}
