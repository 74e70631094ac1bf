//! PE Harvester Library
//!
//! Authenticated retrieval from the threat-intel and DNS-monitoring
//! platforms, normalized into records ready for a sink.

pub mod auth;
pub mod config;
pub mod dns;
pub mod dnsmonitor;
pub mod error;
mod http;
pub mod mapping;
pub mod retry;
pub mod shodan;
pub mod sink;
pub mod sixgill;

pub use auth::{Source, Token, TokenBroker};
pub use config::HarvestConfig;
pub use dns::{resolve, DnsLookup, DnsRecordSet, SystemResolver};
pub use dnsmonitor::{DateRange, DnsMonitorClient, MonitoredDomain};
pub use error::{HarvestError, HarvestResult};
pub use mapping::DomainMapping;
pub use retry::{OnExhausted, RetryPolicy};
pub use shodan::ShodanClient;
pub use sink::{JsonLinesSink, RecordSink};
pub use sixgill::SixgillClient;
