//! Wire and derived data models for inspection documents and observations.
//!
//! Wire structs mirror the backend's JSON field names: the browse list uses
//! snake_case (`fei_number`), timeline records use camelCase (`companyName`,
//! `repeatFinding`). Facility identifiers arrive as either JSON strings or
//! numbers and are normalized to one canonical string form at this boundary.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// FDA facility establishment identifier.
///
/// The backend emits FEI numbers as both JSON numbers and strings depending
/// on the code path. All comparisons, facet lists, and sort keys go through
/// the canonical string form held here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeiNumber(String);

impl FeiNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeiNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeiNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FeiNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for FeiNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(D::Error::custom(format!(
                "expected string or number for FEI number, got {other}"
            ))),
        }
    }
}

/// Deserialize an optional timestamp from either an ISO-8601 string or an
/// epoch-milliseconds number. Unparseable values become `None` rather than
/// failing the whole payload.
fn de_opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }))
}

/// One inspection record from the browse document list (`GET /firebaseData`).
///
/// `summary` and `category` are absent until enrichment fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fei_number: Option<FeiNumber>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One element of the enrichment lookup response (`POST /browseDocuments`).
/// Matched back to documents by company name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One finding within a Form 483 report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cfr_number: Option<String>,
}

/// One inspection record from the time-range analysis (`GET /timeAnalysis`).
///
/// The top-level `summary`/`category`/`cfr_number` fields are a legacy
/// single-observation shape, used as a fallback when `observations` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub fei_number: Option<FeiNumber>,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "date", deserialize_with = "de_opt_datetime")]
    pub inspection_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub repeat_finding: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cfr_number: Option<String>,
}

/// One flattened observation row derived from a [`TimelineRecord`].
///
/// Every record contributes at least one row: one per observation, or one
/// built from the record's fallback fields when it has no observations.
/// Rows are rebuilt in full on every raw-result change, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub company_name: String,
    pub fei_number: Option<FeiNumber>,
    pub url: String,
    pub date: Option<DateTime<Utc>>,
    pub summary: String,
    /// Empty string when the source had no category.
    pub category: String,
    /// Empty string when the source had no CFR citation.
    pub cfr_number: String,
    /// True iff this row's category lexically overlaps the parent record's
    /// repeat-finding phrases.
    pub issue_identified: bool,
}

/// Count of rows sharing one category, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub label: String,
    pub count: usize,
}

/// One repeat-finding phrase surfaced as a systemic issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatIssueEntry {
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fei_number_from_string_and_number_are_equal() {
        let from_string: FeiNumber = serde_json::from_value(Value::from("3012334706")).unwrap();
        let from_number: FeiNumber =
            serde_json::from_value(Value::from(3012334706_i64)).unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(from_string.as_str(), "3012334706");
    }

    #[test]
    fn test_fei_number_rejects_other_json_types() {
        let result: Result<FeiNumber, _> = serde_json::from_value(Value::Bool(true));
        assert!(result.is_err());
    }

    #[test]
    fn test_inspection_document_tolerates_missing_fields() {
        let doc: InspectionDocument = serde_json::from_value(serde_json::json!({
            "name": "Acme Pharma",
        }))
        .unwrap();
        assert_eq!(doc.name, "Acme Pharma");
        assert!(doc.fei_number.is_none());
        assert!(doc.date.is_none());
        assert!(doc.summary.is_none());
    }

    #[test]
    fn test_timeline_record_accepts_date_alias() {
        let record: TimelineRecord = serde_json::from_value(serde_json::json!({
            "companyName": "Acme Pharma",
            "date": "2024-01-05T00:00:00.000Z",
        }))
        .unwrap();
        assert!(record.inspection_date.is_some());
    }

    #[test]
    fn test_timeline_record_parses_nested_observations() {
        let record: TimelineRecord = serde_json::from_value(serde_json::json!({
            "companyName": "Acme Pharma",
            "feiNumber": 3012334706_i64,
            "inspectionDate": "2024-01-05T00:00:00Z",
            "observations": [
                {"summary": "Procedures not followed", "category": "Documentation", "cfrNumber": "21 CFR 211.100"}
            ],
            "repeatFinding": ["Documentation control gap across sites"],
        }))
        .unwrap();
        assert_eq!(record.observations.len(), 1);
        assert_eq!(record.repeat_finding.len(), 1);
        assert_eq!(
            record.fei_number.as_ref().map(FeiNumber::as_str),
            Some("3012334706")
        );
    }

    #[test]
    fn test_unparseable_date_becomes_none() {
        let doc: InspectionDocument = serde_json::from_value(serde_json::json!({
            "name": "Acme Pharma",
            "date": "not a date",
        }))
        .unwrap();
        assert!(doc.date.is_none());
    }
}
