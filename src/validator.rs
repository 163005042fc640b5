// 📐 Input Validator - Identifier format + gross record-list shape
//
// Two fatal cases only: a malformed entity id, and no records at all.
// Everything else is an accumulated warning next to the valid subset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::pipeline::PipelineStage;
use crate::quality::{Issue, IssueKind, Severity};
use crate::records::{Record, RECORD_ID_KEYS};

// ============================================================================
// ENTITY IDENTIFIER
// ============================================================================

/// Check an entity identifier against the UUID shape.
///
/// Accepts hyphenated 8-4-4-4-12 hex or the 32-hex simple form, with
/// surrounding whitespace. Braced and URN forms are rejected.
pub fn validate_entity_id(id: &str) -> Result<Uuid, AnalysisError> {
    let trimmed = id.trim();
    let invalid = |reason: &str| AnalysisError::InvalidIdentifier {
        value: id.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("identifier is empty"));
    }

    let shape_ok = match trimmed.len() {
        36 => trimmed.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        }),
        32 => trimmed.chars().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    };

    if !shape_ok {
        return Err(invalid(
            "expected 8-4-4-4-12 hexadecimal groups or 32 hexadecimal digits",
        ));
    }

    Uuid::parse_str(trimmed).map_err(|e| invalid(&e.to_string()))
}

// ============================================================================
// RECORD LIST
// ============================================================================

/// A malformed or suspicious individual record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralWarning {
    /// Position in the input list
    pub position: usize,

    /// Identifier, when one could be read
    pub record_id: Option<String>,

    /// Error = record excluded, Warn = record kept
    pub severity: Severity,

    pub message: String,
}

impl StructuralWarning {
    fn excluded(position: usize, message: impl Into<String>) -> Self {
        StructuralWarning {
            position,
            record_id: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn into_issue(self) -> Issue {
        let kind = if self.severity == Severity::Error {
            IssueKind::Structural
        } else {
            IssueKind::DuplicateRecord
        };

        let issue = Issue::new(
            self.severity,
            PipelineStage::Validated,
            kind,
            format!("record #{}: {}", self.position, self.message),
        );

        match self.record_id {
            Some(id) => issue.with_record(id),
            None => issue,
        }
    }
}

/// Valid subset plus everything that was wrong with the rest
#[derive(Debug, Clone)]
pub struct ValidatedRecords {
    pub records: Vec<Record>,
    pub warnings: Vec<StructuralWarning>,

    /// Number of items in the input list
    pub received: usize,
}

impl ValidatedRecords {
    pub fn excluded_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == Severity::Error)
            .count()
    }
}

/// Keep every record that at least carries an identifier.
///
/// One bad record never aborts the batch; an empty or non-list input does.
pub fn validate_records(records: &Value) -> Result<ValidatedRecords, AnalysisError> {
    let items = match records {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return Err(AnalysisError::EmptyInput("record list is empty".to_string())),
        Value::Null => return Err(AnalysisError::EmptyInput("records are missing".to_string())),
        other => {
            return Err(AnalysisError::EmptyInput(format!(
                "expected a list of records, got {}",
                json_kind(other)
            )))
        }
    };

    let mut valid = Vec::new();
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();

    for (position, item) in items.iter().enumerate() {
        let body = match item {
            Value::Object(map) => map,
            other => {
                warnings.push(StructuralWarning::excluded(
                    position,
                    format!("expected an object, got {}", json_kind(other)),
                ));
                continue;
            }
        };

        let id = match read_record_id(body) {
            Ok(id) => id,
            Err(message) => {
                warnings.push(StructuralWarning::excluded(position, message));
                continue;
            }
        };

        if !seen_ids.insert(id.clone()) {
            warnings.push(StructuralWarning {
                position,
                record_id: Some(id.clone()),
                severity: Severity::Warn,
                message: format!("duplicate record identifier `{}`", id),
            });
        }

        valid.push(Record {
            id,
            position,
            body: body.clone(),
        });
    }

    Ok(ValidatedRecords {
        records: valid,
        warnings,
        received: items.len(),
    })
}

fn read_record_id(body: &serde_json::Map<String, Value>) -> Result<String, String> {
    let found = RECORD_ID_KEYS
        .iter()
        .find_map(|key| body.get(*key).filter(|v| !v.is_null()));

    match found {
        None => Err("record has no identifier".to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err("record identifier is blank".to_string()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(format!(
            "record identifier must be a string or integer, got {}",
            json_kind(other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
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
// TESTS
// ============================================================================
