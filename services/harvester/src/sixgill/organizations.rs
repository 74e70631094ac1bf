//! Organization and asset retrieval

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::SixgillClient;
use crate::auth::Token;
use crate::error::{HarvestError, HarvestResult};

const ORGANIZATIONS_PATH: &str = "/multi-tenant/organization";

/// An organization tracked by the threat-intel platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    /// Unique organization name
    pub name: String,
    /// Opaque identifier used by asset and alert calls (empty when absent)
    pub organization_id: String,
    /// Every other field of the source record, in column order.
    /// Fields a record lacks are `null`.
    pub attributes: Vec<Value>,
}

/// Collapse raw organization records into `name -> Organization`
///
/// Columns are the union of every record's keys (except `name`) in first-seen
/// order. Records without a string `name` are logged and skipped; a later
/// record with the same name replaces an earlier one.
pub fn collapse_organizations(records: Vec<Value>) -> BTreeMap<String, Organization> {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        if let Some(fields) = record.as_object() {
            for key in fields.keys() {
                if key != "name" && !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut organizations = BTreeMap::new();
    for (index, record) in records.into_iter().enumerate() {
        let Value::Object(fields) = record else {
            warn!(index, "Skipping organization record that is not an object");
            continue;
        };

        let Some(name) = fields.get("name").and_then(Value::as_str) else {
            warn!(index, "Skipping organization record without a name");
            continue;
        };

        let organization_id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };

        let attributes = columns
            .iter()
            .map(|column| fields.get(column).cloned().unwrap_or(Value::Null))
            .collect();

        organizations.insert(
            name.to_string(),
            Organization {
                name: name.to_string(),
                organization_id,
                attributes,
            },
        );
    }

    organizations
}

impl SixgillClient {
    /// List every organization in one call (the endpoint does not paginate)
    pub async fn list_organizations(&self, token: &Token) -> HarvestResult<BTreeMap<String, Organization>> {
        let records: Value = self.api.get_json(token, ORGANIZATIONS_PATH).await?;

        let Value::Array(records) = records else {
            return Err(HarvestError::malformed(
                ORGANIZATIONS_PATH,
                "expected an array of organizations",
            ));
        };

        let organizations = collapse_organizations(records);
        info!(count = organizations.len(), "Fetched organizations");
        Ok(organizations)
    }

    /// Raw asset listing for one organization, under the asset retry policy
    ///
    /// With the default policy a transport failure can still reach the
    /// caller: once the retries are spent, one final call is made and its
    /// outcome is returned as-is.
    pub async fn get_assets(&self, token: &Token, org_id: &str) -> HarvestResult<Value> {
        let path = format!("{}/{}/assets", ORGANIZATIONS_PATH, org_id);
        let query = [("organization_id", org_id)];

        self.assets_retry
            .run("org_assets", || self.api.get_json_query(token, &path, &query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collapse_keeps_column_order_and_fills_gaps() {
        let records = vec![
            json!({"name": "Acme", "id": "org-1", "tier": "gold"}),
            json!({"id": "org-2", "name": "Globex", "region": "us"}),
        ];

        let orgs = collapse_organizations(records);

        let acme = &orgs["Acme"];
        assert_eq!(acme.organization_id, "org-1");
        assert_eq!(acme.attributes, vec![json!("org-1"), json!("gold"), Value::Null]);

        let globex = &orgs["Globex"];
        assert_eq!(globex.attributes, vec![json!("org-2"), Value::Null, json!("us")]);
    }

    #[test]
    fn test_collapse_skips_unnamed_records() {
        let records = vec![
            json!({"id": "org-1"}),
            json!("not an object"),
            json!({"name": "Initech"}),
        ];

        let orgs = collapse_organizations(records);

        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs["Initech"].organization_id, "");
    }

    #[test]
    fn test_collapse_later_duplicate_wins() {
        let records = vec![
            json!({"name": "Acme", "id": "first"}),
            json!({"name": "Acme", "id": "second"}),
        ];

        let orgs = collapse_organizations(records);
        assert_eq!(orgs["Acme"].organization_id, "second");
    }
}
