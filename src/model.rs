// 🧾 Extracted Model - Per-bureau snapshots after extraction and categorization
//
// Dates here are already resolved through inheritance; values are already
// tagged. Nothing downstream re-reads raw JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bureau::Bureau;
use crate::categorizer::Category;
use crate::sentinel::MetricValue;

// ============================================================================
// SCORE ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub value: MetricValue,

    /// Value as it appeared upstream
    pub raw_value: String,

    /// Scoring model / type tag (e.g. "FICO8", "VantageScore 3.0")
    pub model: Option<String>,

    /// Source bureau (defaults to the parent report's bureau)
    pub bureau: Bureau,

    /// Date carried by the entry itself, if any
    pub own_date: Option<NaiveDate>,

    /// Own date, else parent report date. None only on undated reports.
    pub effective_date: Option<NaiveDate>,
}

// ============================================================================
// SUMMARY PARAMETER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryParameter {
    pub name: String,
    pub value: MetricValue,
    pub raw_value: String,
    pub own_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
}

impl SummaryParameter {
    pub fn is_dated(&self) -> bool {
        self.effective_date.is_some()
    }
}

// ============================================================================
// CREDIT REPORT (extracted)
// ============================================================================

/// One bureau snapshot as extracted from a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    /// Record this report came from
    pub record_id: String,

    /// Ingestion order across the whole request (tie-breaker for ordering)
    pub sequence: usize,

    pub bureau: Bureau,
    pub issued_date: Option<NaiveDate>,

    /// True when the report has no resolvable date of its own
    pub undated: bool,

    pub scores: Vec<ScoreEntry>,
    pub parameters: Vec<SummaryParameter>,
}

// ============================================================================
// CATEGORIZED SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedParameter {
    #[serde(flatten)]
    pub parameter: SummaryParameter,

    pub category: Category,

    /// Rule or catalog entry that produced the category (None for Other)
    pub matched_by: Option<String>,
}

impl CategorizedParameter {
    /// Dated and mapped to a real category
    pub fn is_covered(&self) -> bool {
        self.parameter.is_dated() && self.category != Category::Other
    }
}

/// A credit report after categorization; the unit timelines are built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub record_id: String,
    pub sequence: usize,
    pub bureau: Bureau,
    pub issued_date: Option<NaiveDate>,
    pub undated: bool,
    pub scores: Vec<ScoreEntry>,
    pub parameters: Vec<CategorizedParameter>,
}

impl Snapshot {
    /// Parameters in a category, in ingestion order
    pub fn parameters_in(&self, category: Category) -> impl Iterator<Item = &CategorizedParameter> {
        self.parameters.iter().filter(move |p| p.category == category)
    }
}
