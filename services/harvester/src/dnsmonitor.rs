//! DNS-monitoring platform retrieval
//!
//! Monitored domains are joined against the caller's domain mapping; a
//! domain without a mapping row is kept with the sentinel organization
//! [`UNMAPPED_ORG`].

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::auth::Token;
use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::http::ApiClient;
use crate::mapping::DomainMapping;

const DOMAINS_PATH: &str = "/GetDomains";
const ALERTS_PATH: &str = "/GetAlerts";

/// Organization assigned to monitored domains missing from the mapping
pub const UNMAPPED_ORG: &str = "NA";

/// Wire format of the alert date range bounds
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A monitored domain joined to its organization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredDomain {
    /// Every field of the upstream domain record
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Mapped organization, or [`UNMAPPED_ORG`]
    pub org: String,
}

impl MonitoredDomain {
    pub fn domain_name(&self) -> Option<&str> {
        self.fields.get("domainName").and_then(Value::as_str)
    }

    pub fn domain_id(&self) -> Option<&Value> {
        self.fields.get("domainId")
    }
}

/// Left-join domain records against the mapping on `domainName`
///
/// Each record yields one row per matching mapping row, or a single
/// [`UNMAPPED_ORG`] row when nothing matches. No record is dropped. The
/// mapping's own `domain_name` column is not carried into the output.
pub fn join_domains(records: Vec<Value>, mapping: &DomainMapping) -> Vec<MonitoredDomain> {
    let mut joined = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let fields = match record {
            Value::Object(fields) => fields,
            other => {
                warn!(index, "Monitored domain record is not an object, keeping it unmapped");
                let mut fields = Map::new();
                fields.insert("value".to_string(), other);
                fields
            }
        };

        let orgs: Vec<String> = match fields.get("domainName").and_then(Value::as_str) {
            Some(name) => mapping.orgs_for(name).map(str::to_string).collect(),
            None => Vec::new(),
        };

        if orgs.is_empty() {
            joined.push(MonitoredDomain {
                fields,
                org: UNMAPPED_ORG.to_string(),
            });
            continue;
        }

        for org in orgs {
            joined.push(MonitoredDomain {
                fields: fields.clone(),
                org,
            });
        }
    }

    joined
}

/// Half-open date range `[from, to)` for domain alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> HarvestResult<Self> {
        if from > to {
            return Err(HarvestError::Config(format!(
                "Date range starts after it ends: {} > {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertsRequest<'a, T: Serialize> {
    domain_ids: &'a [T],
    from_date: String,
    to_date: String,
    alert_type: Option<String>,
    show_buffer_period: bool,
}

/// Client for the DNS-monitoring REST API
pub struct DnsMonitorClient {
    api: ApiClient,
}

impl DnsMonitorClient {
    pub fn new(config: &HarvestConfig) -> HarvestResult<Self> {
        Ok(Self {
            api: ApiClient::new(&config.endpoints.dnsmonitor_api, &config.http)?,
        })
    }

    /// Every monitored domain, joined to the organization mapping
    pub async fn list_monitored_domains(
        &self,
        token: &Token,
        mapping: &DomainMapping,
    ) -> HarvestResult<Vec<MonitoredDomain>> {
        let records: Value = self.api.get_json(token, DOMAINS_PATH).await?;

        let Value::Array(records) = records else {
            return Err(HarvestError::malformed(DOMAINS_PATH, "expected an array of domains"));
        };

        let joined = join_domains(records, mapping);
        let unmapped = joined.iter().filter(|d| d.org == UNMAPPED_ORG).count();
        info!(rows = joined.len(), unmapped, "Fetched monitored domains");

        Ok(joined)
    }

    /// Alert rows for the given domains over one date range
    ///
    /// The endpoint does not paginate. Domain ids are sent as a JSON array in
    /// the request body, whatever their type upstream.
    pub async fn get_domain_alerts<T: Serialize>(
        &self,
        token: &Token,
        domain_ids: &[T],
        range: DateRange,
    ) -> HarvestResult<Vec<Value>> {
        let body = AlertsRequest {
            domain_ids,
            from_date: range.from.format(DATE_FORMAT).to_string(),
            to_date: range.to.format(DATE_FORMAT).to_string(),
            alert_type: None,
            show_buffer_period: false,
        };

        debug!(domains = domain_ids.len(), from = %range.from, to = %range.to, "Fetching domain alerts");

        let rows: Value = self.api.get_json_with_body(token, ALERTS_PATH, &body).await?;
        match rows {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            _ => Err(HarvestError::malformed(ALERTS_PATH, "expected an array of alerts")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DomainOrg;
    use serde_json::json;

    fn mapping() -> DomainMapping {
        DomainMapping::new(vec![
            DomainOrg {
                domain_name: "acme.com".into(),
                org: "ACME".into(),
            },
            DomainOrg {
                domain_name: "globex.net".into(),
                org: "GLOBEX".into(),
            },
            DomainOrg {
                domain_name: "globex.net".into(),
                org: "GLOBEX-EU".into(),
            },
        ])
    }

    #[test]
    fn test_join_fills_unmapped_with_sentinel() {
        let records = vec![
            json!({"domainId": 1, "domainName": "acme.com"}),
            json!({"domainId": 2, "domainName": "initech.org"}),
            json!({"domainId": 3}),
        ];

        let joined = join_domains(records, &mapping());

        assert_eq!(joined.len(), 3);
        assert_eq!(joined[0].org, "ACME");
        assert_eq!(joined[1].org, UNMAPPED_ORG);
        assert_eq!(joined[2].org, UNMAPPED_ORG);
        assert_eq!(joined[1].domain_name(), Some("initech.org"));
        assert_eq!(joined[2].domain_id(), Some(&json!(3)));
    }

    #[test]
    fn test_join_duplicates_rows_per_mapping_match() {
        let records = vec![json!({"domainId": 7, "domainName": "globex.net"})];

        let joined = join_domains(records, &mapping());

        let orgs: Vec<&str> = joined.iter().map(|d| d.org.as_str()).collect();
        assert_eq!(orgs, vec!["GLOBEX", "GLOBEX-EU"]);
        assert!(joined.iter().all(|d| d.domain_id() == Some(&json!(7))));
    }

    #[test]
    fn test_join_output_drops_mapping_key() {
        let joined = join_domains(vec![json!({"domainName": "acme.com"})], &mapping());
        let row = serde_json::to_value(&joined[0]).unwrap();

        assert_eq!(row, json!({"domainName": "acme.com", "org": "ACME"}));
        assert!(row.get("domain_name").is_none());
    }

    #[test]
    fn test_join_keeps_non_object_records() {
        let joined = join_domains(vec![json!("acme.com")], &mapping());

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].org, UNMAPPED_ORG);
    }

    #[test]
    fn test_alert_request_body() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let range = DateRange::new(from, to).unwrap();
        let ids = [11, 12];

        let body = AlertsRequest {
            domain_ids: &ids,
            from_date: range.from.format(DATE_FORMAT).to_string(),
            to_date: range.to.format(DATE_FORMAT).to_string(),
            alert_type: None,
            show_buffer_period: false,
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "domainIds": [11, 12],
                "fromDate": "2024-01-01",
                "toDate": "2024-02-01",
                "alertType": null,
                "showBufferPeriod": false
            })
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(DateRange::new(from, to).is_err());
    }
}
