//! Domain-to-organization mapping
//!
//! Rows of `(domain_name, org)` loaded from CSV. Extra columns are ignored
//! and duplicate domain names are kept.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};

/// One mapping row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOrg {
    pub domain_name: String,
    pub org: String,
}

/// Every mapping row, in file order
#[derive(Debug, Clone, Default)]
pub struct DomainMapping {
    rows: Vec<DomainOrg>,
}

impl DomainMapping {
    pub fn new(rows: Vec<DomainOrg>) -> Self {
        Self { rows }
    }

    pub fn from_path(path: impl AsRef<Path>) -> HarvestResult<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)
            .map_err(|e| HarvestError::Mapping(format!("{}: {}", path.display(), e)))?;
        Self::from_csv(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> HarvestResult<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> HarvestResult<Self> {
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<DomainOrg>, _>>()
            .map_err(|e| HarvestError::Mapping(e.to_string()))?;

        debug!(rows = rows.len(), "Loaded domain mapping");
        Ok(Self { rows })
    }

    /// Organizations mapped to `domain_name`, one per matching row
    pub fn orgs_for<'a>(&'a self, domain_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.domain_name == domain_name)
            .map(|row| row.org.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
domain_name,org,notes
acme.com,ACME,primary
globex.net,GLOBEX,
acme.com,ACME-SUB,subsidiary
";

    #[test]
    fn test_reads_rows_and_ignores_extra_columns() {
        let mapping = DomainMapping::from_reader(CSV.as_bytes()).unwrap();

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.orgs_for("globex.net").collect::<Vec<_>>(), vec!["GLOBEX"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mapping = DomainMapping::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(
            mapping.orgs_for("acme.com").collect::<Vec<_>>(),
            vec!["ACME", "ACME-SUB"]
        );
        assert_eq!(mapping.orgs_for("unknown.org").count(), 0);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let err = DomainMapping::from_reader("domain_name\nacme.com\n".as_bytes()).unwrap_err();
        assert!(matches!(err, HarvestError::Mapping(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let mapping = DomainMapping::from_path(file.path()).unwrap();
        assert!(!mapping.is_empty());

        assert!(DomainMapping::from_path("/nonexistent/map.csv").is_err());
    }
}
