// 🚨 Error Types - Fatal request errors vs typed expected outcomes
//
// Only whole-input failures are errors here. Per-record problems are
// Issues (see quality.rs) and never abort a batch.

use std::path::PathBuf;

use thiserror::Error;

use crate::bureau::Bureau;
use crate::pipeline::PipelineStage;

// ============================================================================
// FATAL ANALYSIS ERRORS
// ============================================================================

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// Entity identifier failed the UUID-like format check
    #[error("invalid entity identifier `{value}`: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// No records at all (empty list or not a list)
    #[error("no records supplied: {0}")]
    EmptyInput(String),

    /// Pipeline attempted a non-forward stage transition
    #[error("invalid pipeline transition from {from:?} to {to:?}")]
    StageTransition {
        from: PipelineStage,
        to: PipelineStage,
    },
}

impl AnalysisError {
    /// Stable machine-readable code for callers that map errors to responses
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidIdentifier { .. } => "invalid_identifier",
            AnalysisError::EmptyInput(_) => "empty_input",
            AnalysisError::StageTransition { .. } => "stage_transition",
        }
    }
}

// ============================================================================
// EXPECTED OUTCOMES
// ============================================================================

/// A bureau has zero dated snapshots.
///
/// Customers legitimately have single-bureau or zero-bureau data, so this is
/// a value the synthesizer consumes, not a crash.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("bureau {bureau} has no dated snapshots")]
pub struct EmptyTimelineError {
    pub bureau: Bureau,
}

// ============================================================================
// CATEGORY TABLE ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not read category table `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse keyword rules: {0}")]
    ParseRules(#[from] serde_json::Error),
    #[error("could not parse field catalog: {0}")]
    ParseCatalog(#[from] csv::Error),
    #[error("unknown category `{value}` in field catalog row {row}")]
    UnknownCategory { value: String, row: usize },
    #[error("keyword rule `{0}` has no keywords")]
    EmptyRule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let invalid = AnalysisError::InvalidIdentifier {
            value: "not-a-uuid".to_string(),
            reason: "bad length".to_string(),
        };
        assert_eq!(invalid.code(), "invalid_identifier");
        assert_eq!(AnalysisError::EmptyInput("[]".to_string()).code(), "empty_input");
    }

    #[test]
    fn test_empty_timeline_message_names_bureau() {
        let err = EmptyTimelineError {
            bureau: Bureau::new("Equifax"),
        };
        assert_eq!(err.to_string(), "bureau Equifax has no dated snapshots");
    }
}
