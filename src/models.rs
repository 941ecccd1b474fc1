//! Core data models for the mechanism search pipeline.
//!
//! Wire shapes mirror the two upstream systems: the FactsInfo tabular search
//! service and the DHIS2-style metadata API. View types ([`SearchReport`],
//! [`DatimInfo`]) are the immutable values published to callers.

use serde::{Deserialize, Serialize};

/// Field offset of the mechanism code within a FactsInfo row (the HQ
/// mechanism ID column). The upstream service pins this position.
pub const MECHANISM_CODE_FIELD: usize = 4;

/// Raw tabular payload from the FactsInfo search endpoint.
///
/// Row 0 of `data` holds the column header labels; the remaining rows are
/// mechanism records.
#[derive(Debug, Clone, Deserialize)]
pub struct TabularResponse {
    pub data: Vec<Vec<String>>,
}

/// One FactsInfo record row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRow {
    pub fields: Vec<String>,
    /// Trailing `Active` column coerced from text. `None` when the field is
    /// missing or not base-10 numeric (the upstream sometimes sends blanks).
    pub active: Option<i64>,
}

impl SearchRow {
    pub fn parse(fields: Vec<String>) -> Self {
        let active = fields.last().and_then(|f| f.trim().parse::<i64>().ok());
        Self { fields, active }
    }

    /// The mechanism code used for the metadata lookup, when the row is wide
    /// enough to carry one.
    pub fn mechanism_code(&self) -> Option<&str> {
        self.fields.get(MECHANISM_CODE_FIELD).map(String::as_str)
    }
}

/// Descriptor resource used to discover the metadata API base URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub activities: ManifestActivities,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestActivities {
    pub dhis: DhisActivity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DhisActivity {
    pub href: String,
}

/// Envelope returned by the `categoryOptions.json` lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryOptionsResponse {
    #[serde(rename = "categoryOptions", default)]
    pub category_options: Vec<CategoryOption>,
}

/// Metadata record representing a mechanism.
///
/// Only the fields the pipeline inspects are typed; the remaining `:owner`
/// fields ride along in `extra` so the record can be re-serialized intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub categories: Vec<serde_json::Value>,
    #[serde(default)]
    pub category_option_combos: Vec<serde_json::Value>,
    #[serde(default)]
    pub category_option_groups: Vec<CategoryOptionGroup>,
    #[serde(default)]
    pub organisation_units: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CategoryOption {
    /// Best available human-readable label.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("(unnamed)")
    }
}

/// Tag-like grouping on a category option. The code prefix encodes the
/// semantic role (`Agency_*` vs `Partner_*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOptionGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Semantic role encoded in a group's code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Agency,
    Partner,
}

impl GroupRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            GroupRole::Agency => "Agency_",
            GroupRole::Partner => "Partner_",
        }
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupRole::Agency => write!(f, "agency"),
            GroupRole::Partner => write!(f, "partner"),
        }
    }
}

/// Metadata-side view of a mechanism, derived from the category option.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatimInfo {
    pub mechanism: Option<CategoryOption>,
    pub agency: Option<CategoryOptionGroup>,
    pub partner: Option<CategoryOptionGroup>,
}

/// The immutable result of one search invocation.
///
/// Built once the full chain has run and published with a single assignment;
/// never mutated in place across pipeline steps.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Monotonic token identifying this invocation; stale reports are never
    /// published over newer ones.
    pub generation: u64,
    pub query: String,
    pub headers: Vec<String>,
    pub rows: Vec<SearchRow>,
    pub found_in_facts_info: bool,
    pub found_in_datim: bool,
    pub datim: DatimInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_coerces_trailing_integer() {
        let row = SearchRow::parse(vec!["a".into(), "b".into(), "1".into()]);
        assert_eq!(row.active, Some(1));
    }

    #[test]
    fn test_row_non_numeric_trailing_field() {
        let row = SearchRow::parse(vec!["a".into(), "b".into(), "yes".into()]);
        assert_eq!(row.active, None);
        assert_eq!(row.fields, vec!["a", "b", "yes"]);
    }

    #[test]
    fn test_row_empty() {
        let row = SearchRow::parse(vec![]);
        assert_eq!(row.active, None);
        assert_eq!(row.mechanism_code(), None);
    }

    #[test]
    fn test_mechanism_code_offset() {
        let row = SearchRow::parse(
            ["2020-01-01", "Kenya", "2020", "COP19", "12345", "1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(row.mechanism_code(), Some("12345"));
    }

    #[test]
    fn test_manifest_missing_href_fails() {
        let err = serde_json::from_str::<Manifest>(r#"{"activities": {"dhis": {}}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_category_option_preserves_extra_fields() {
        let option: CategoryOption = serde_json::from_str(
            r#"{"displayName": "Mech", "id": "abc123", "shortName": "M"}"#,
        )
        .unwrap();
        assert_eq!(option.label(), "Mech");
        assert_eq!(option.extra.get("id").unwrap(), "abc123");
        let out = serde_json::to_value(&option).unwrap();
        assert_eq!(out["shortName"], "M");
    }
}
