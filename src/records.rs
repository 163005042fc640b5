// 📥 Input Records - Typed intermediate representation of upstream payloads
//
// The graph API hands us loosely-shaped JSON. Everything here turns
// "is this field present and well-shaped" into Option handling on typed
// structs instead of ad hoc key probing further down the pipeline.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use thiserror::Error;

// ============================================================================
// ENTITY + RECORD
// ============================================================================

/// Customer identity container as delivered upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(alias = "entity_id", alias = "entityId")]
    pub id: String,

    /// Kept as raw JSON so a non-list payload can be reported, not rejected by serde
    #[serde(default)]
    pub records: Value,
}

impl Entity {
    pub fn new(id: impl Into<String>, records: Vec<Value>) -> Self {
        Entity {
            id: id.into(),
            records: Value::Array(records),
        }
    }
}

/// A structurally minimal-valid record (has an identifier)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Identifier as text (numeric ids are stringified)
    pub id: String,

    /// Position in the original input list
    pub position: usize,

    /// Remaining body, searched by the extractor
    pub body: Map<String, Value>,
}

/// Keys accepted for a record identifier
pub const RECORD_ID_KEYS: [&str; 3] = ["id", "record_id", "recordId"];

/// Keys under which a credit-report block may live
pub const CREDIT_REPORT_KEYS: [&str; 4] = [
    "credit_report",
    "creditReport",
    "CreditReport",
    "credit_report_block",
];

/// How deep the extractor looks for a credit-report block
pub const MAX_BLOCK_DEPTH: usize = 4;

impl Record {
    /// Breadth-first search for the first credit-report block.
    ///
    /// Objects and arrays are both walked; top-level keys win over nested ones.
    pub fn credit_report_block(&self) -> Option<&Value> {
        let mut queue: VecDeque<(&Map<String, Value>, usize)> = VecDeque::new();
        queue.push_back((&self.body, 0));

        while let Some((map, depth)) = queue.pop_front() {
            for key in CREDIT_REPORT_KEYS {
                if let Some(block) = map.get(key) {
                    if !block.is_null() {
                        return Some(block);
                    }
                }
            }

            if depth + 1 >= MAX_BLOCK_DEPTH {
                continue;
            }

            for value in map.values() {
                match value {
                    Value::Object(child) => queue.push_back((child, depth + 1)),
                    Value::Array(items) => {
                        for item in items {
                            if let Value::Object(child) = item {
                                queue.push_back((child, depth + 1));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        None
    }
}

// ============================================================================
// CREDIT REPORT BLOCK
// ============================================================================

/// Keys tried for each block field, highest priority first
pub const BUREAU_KEYS: [&str; 4] = ["bureau", "bureau_name", "bureauName", "source"];
pub const ISSUED_DATE_KEYS: [&str; 5] = [
    "issued_date",
    "issuedDate",
    "report_date",
    "reportDate",
    "date",
];
pub const SCORES_KEYS: [&str; 3] = ["scores", "score_entries", "scoreEntries"];
pub const SUMMARY_KEYS: [&str; 3] = ["summary_parameters", "summaryParameters", "summary"];

pub const SCORE_VALUE_KEYS: [&str; 2] = ["score", "value"];
pub const SCORE_MODEL_KEYS: [&str; 6] = [
    "model",
    "model_type",
    "modelType",
    "score_type",
    "scoreType",
    "type",
];
pub const SCORE_BUREAU_KEYS: [&str; 3] = ["bureau", "source_bureau", "sourceBureau"];
pub const SCORE_DATE_KEYS: [&str; 4] = ["date", "score_date", "scoreDate", "as_of"];

pub const PARAMETER_NAME_KEYS: [&str; 4] = ["name", "parameter", "label", "key"];
pub const PARAMETER_DATE_KEYS: [&str; 2] = ["date", "as_of"];

/// A block field that is present but has the wrong shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),
    #[error("`{key}` must be {expected}, found {found}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Credit-report block as found inside a record
#[derive(Debug, Clone, Default)]
pub struct CreditReportBlock {
    pub bureau: Option<String>,
    pub issued_date: Option<Value>,
    pub scores: Vec<Value>,
    pub summary_parameters: Option<RawParameters>,
}

impl CreditReportBlock {
    /// Read a block, taking the first non-null key of each field.
    ///
    /// Redundant keys (`bureau` next to `source`) are fine; the
    /// higher-priority one wins and the rest are ignored.
    pub fn from_json(value: &Value) -> Result<Self, BlockError> {
        let map = as_object(value)?;

        let scores = match first_present(map, &SCORES_KEYS) {
            None => Vec::new(),
            Some((_, Value::Array(items))) => items.clone(),
            Some((key, other)) => return Err(wrong_type(key, "a list", other)),
        };

        let summary_parameters = match first_present(map, &SUMMARY_KEYS) {
            None => None,
            Some((_, Value::Array(items))) => Some(RawParameters::List(items.clone())),
            Some((_, Value::Object(entries))) => Some(RawParameters::Map(entries.clone())),
            Some((key, other)) => return Err(wrong_type(key, "a list or a map", other)),
        };

        Ok(CreditReportBlock {
            bureau: text_field(map, &BUREAU_KEYS)?,
            issued_date: first_present(map, &ISSUED_DATE_KEYS).map(|(_, v)| v.clone()),
            scores,
            summary_parameters,
        })
    }
}

/// Summary parameters arrive either as a list of objects or a name→value map
#[derive(Debug, Clone)]
pub enum RawParameters {
    List(Vec<Value>),
    Map(Map<String, Value>),
}

/// One score entry
#[derive(Debug, Clone, Default)]
pub struct ScoreBlock {
    pub score: Option<Value>,
    pub model: Option<String>,
    pub bureau: Option<String>,
    pub date: Option<Value>,
}

impl ScoreBlock {
    pub fn from_json(value: &Value) -> Result<Self, BlockError> {
        let map = as_object(value)?;

        Ok(ScoreBlock {
            score: first_present(map, &SCORE_VALUE_KEYS).map(|(_, v)| v.clone()),
            model: text_field(map, &SCORE_MODEL_KEYS)?,
            bureau: text_field(map, &SCORE_BUREAU_KEYS)?,
            date: first_present(map, &SCORE_DATE_KEYS).map(|(_, v)| v.clone()),
        })
    }
}

/// One summary parameter (list form)
#[derive(Debug, Clone, Default)]
pub struct ParameterBlock {
    pub name: Option<String>,
    pub value: Option<Value>,
    pub date: Option<Value>,
}

impl ParameterBlock {
    pub fn from_json(value: &Value) -> Result<Self, BlockError> {
        let map = as_object(value)?;

        Ok(ParameterBlock {
            name: text_field(map, &PARAMETER_NAME_KEYS)?,
            value: first_present(map, &["value"]).map(|(_, v)| v.clone()),
            date: first_present(map, &PARAMETER_DATE_KEYS).map(|(_, v)| v.clone()),
        })
    }
}

/// First key in `keys` that is present with a non-null value
pub fn first_present<'m>(
    map: &'m Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'m Value)> {
    keys.iter()
        .find_map(|&key| map.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}

fn text_field(map: &Map<String, Value>, keys: &[&'static str]) -> Result<Option<String>, BlockError> {
    match first_present(map, keys) {
        None => Ok(None),
        Some((_, Value::String(text))) => Ok(Some(text.clone())),
        Some((key, other)) => Err(wrong_type(key, "a string", other)),
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, BlockError> {
    value
        .as_object()
        .ok_or_else(|| BlockError::NotAnObject(json_type(value)))
}

fn wrong_type(key: &'static str, expected: &'static str, found: &Value) -> BlockError {
    BlockError::WrongType {
        key,
        expected,
        found: json_type(found),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Outcome of reading a date field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    Present(NaiveDate),
    Absent,
    Invalid(String),
}

impl DateField {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateField::Present(d) => Some(*d),
            _ => None,
        }
    }
}

/// Read an optional date value.
///
/// Accepts YYYY-MM-DD, MM/DD/YYYY, YYYY/MM/DD and RFC 3339 timestamps.
pub fn parse_date(value: Option<&Value>) -> DateField {
    let text = match value {
        None | Some(Value::Null) => return DateField::Absent,
        Some(Value::String(s)) => s.trim(),
        Some(other) => return DateField::Invalid(other.to_string()),
    };

    if text.is_empty() {
        return DateField::Absent;
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return DateField::Present(date);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return DateField::Present(ts.date_naive());
    }

    DateField::Invalid(text.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(body: Value) -> Record {
        Record {
            id: "r1".to_string(),
            position: 0,
            body: body.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_block_found_at_top_level() {
        let r = record(json!({"credit_report": {"bureau": "Experian"}}));
        assert_eq!(r.credit_report_block(), Some(&json!({"bureau": "Experian"})));
    }

    #[test]
    fn test_block_found_nested() {
        let r = record(json!({
            "fields": {"payload": {"creditReport": {"bureau": "Equifax"}}}
        }));
        assert_eq!(r.credit_report_block(), Some(&json!({"bureau": "Equifax"})));
    }

    #[test]
    fn test_block_found_inside_array() {
        let r = record(json!({
            "attachments": [{"kind": "doc"}, {"CreditReport": {"bureau": "TU"}}]
        }));
        assert_eq!(r.credit_report_block(), Some(&json!({"bureau": "TU"})));
    }

    #[test]
    fn test_top_level_block_wins() {
        let r = record(json!({
            "nested": {"credit_report": {"bureau": "Equifax"}},
            "credit_report": {"bureau": "Experian"}
        }));
        assert_eq!(r.credit_report_block(), Some(&json!({"bureau": "Experian"})));
    }

    #[test]
    fn test_sibling_blocks_resolve_in_ingestion_order() {
        let r = record(json!({
            "zeta": {"credit_report": {"bureau": "Experian"}},
            "alpha": {"credit_report": {"bureau": "Equifax"}}
        }));
        assert_eq!(r.credit_report_block(), Some(&json!({"bureau": "Experian"})));
    }

    #[test]
    fn test_block_beyond_depth_is_ignored() {
        let r = record(json!({
            "a": {"b": {"c": {"d": {"credit_report": {"bureau": "Experian"}}}}}
        }));
        assert!(r.credit_report_block().is_none());
    }

    #[test]
    fn test_no_block() {
        let r = record(json!({"name": "checking account"}));
        assert!(r.credit_report_block().is_none());
    }

    #[test]
    fn test_block_aliases_are_read() {
        let block = CreditReportBlock::from_json(&json!({
            "bureauName": "Experian",
            "reportDate": "2024-01-01",
            "scoreEntries": [{"value": 700, "type": "FICO8"}],
            "summary": {"Total inquiries": 2}
        }))
        .unwrap();

        assert_eq!(block.bureau.as_deref(), Some("Experian"));
        assert_eq!(block.issued_date, Some(json!("2024-01-01")));
        assert_eq!(block.scores.len(), 1);
        assert!(matches!(block.summary_parameters, Some(RawParameters::Map(_))));

        let score = ScoreBlock::from_json(&block.scores[0]).unwrap();
        assert_eq!(score.model.as_deref(), Some("FICO8"));
        assert_eq!(score.score, Some(json!(700)));
    }

    #[test]
    fn test_redundant_keys_take_highest_priority() {
        let block = CreditReportBlock::from_json(&json!({
            "source": "graph-api",
            "bureau": "Equifax",
            "date": "2023-01-01",
            "issued_date": "2024-05-01",
            "scores": [{"type": "credit", "model": "FICO8", "value": 1, "score": 710}]
        }))
        .unwrap();

        assert_eq!(block.bureau.as_deref(), Some("Equifax"));
        assert_eq!(block.issued_date, Some(json!("2024-05-01")));

        let score = ScoreBlock::from_json(&block.scores[0]).unwrap();
        assert_eq!(score.model.as_deref(), Some("FICO8"));
        assert_eq!(score.score, Some(json!(710)));
    }

    #[test]
    fn test_null_key_falls_through_to_alias() {
        let block = CreditReportBlock::from_json(&json!({
            "bureau": null,
            "bureau_name": "TransUnion",
            "scores": null
        }))
        .unwrap();

        assert_eq!(block.bureau.as_deref(), Some("TransUnion"));
        assert!(block.scores.is_empty());
    }

    #[test]
    fn test_wrong_field_shape_is_an_error() {
        let err = CreditReportBlock::from_json(&json!({"bureau": "Equifax", "scores": 12})).unwrap_err();
        assert_eq!(err.to_string(), "`scores` must be a list, found a number");

        let err = ScoreBlock::from_json(&json!("seven hundred")).unwrap_err();
        assert_eq!(err, BlockError::NotAnObject("a string"));

        let err = ParameterBlock::from_json(&json!({"name": 7, "value": 1})).unwrap_err();
        assert!(matches!(err, BlockError::WrongType { key: "name", .. }));
    }

    #[test]
    fn test_summary_map_keeps_ingestion_order() {
        let block = CreditReportBlock::from_json(&json!({
            "bureau": "Experian",
            "summary": {"Revolving utilization": "30%", "Installment utilization": "80%"}
        }))
        .unwrap();

        let names: Vec<&str> = match &block.summary_parameters {
            Some(RawParameters::Map(map)) => map.keys().map(String::as_str).collect(),
            other => panic!("expected map form, got {:?}", other),
        };
        assert_eq!(names, vec!["Revolving utilization", "Installment utilization"]);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        for text in ["2024-06-01", "06/01/2024", "2024/06/01", "2024-06-01T10:30:00Z"] {
            assert_eq!(parse_date(Some(&json!(text))), DateField::Present(expected), "{text}");
        }
    }

    #[test]
    fn test_parse_date_absent_and_invalid() {
        assert_eq!(parse_date(None), DateField::Absent);
        assert_eq!(parse_date(Some(&Value::Null)), DateField::Absent);
        assert_eq!(parse_date(Some(&json!("  "))), DateField::Absent);
        assert_eq!(
            parse_date(Some(&json!("last tuesday"))),
            DateField::Invalid("last tuesday".to_string())
        );
        assert_eq!(parse_date(Some(&json!(20240601))), DateField::Invalid("20240601".to_string()));
    }

    #[test]
    fn test_entity_deserializes_with_alias() {
        let entity: Entity = serde_json::from_value(json!({
            "entityId": "6f1c2a52-8f0e-4f5a-9a53-2d8b1f1f4e11",
            "records": [{"id": "r1"}]
        }))
        .unwrap();

        assert_eq!(entity.id, "6f1c2a52-8f0e-4f5a-9a53-2d8b1f1f4e11");
        assert!(entity.records.is_array());
    }
}
