// ✅ Data Quality Reporter - Issues, coverage, and confidence for one analysis
//
// Every non-fatal problem from every stage lands here as an Issue. The report
// also scores how much of the input could actually be used:
//
//   coverage   = dated + categorized parameters / all parameters
//   confidence = coverage × share of expected bureaus present

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::bureau::Bureau;
use crate::categorizer::Category;
use crate::model::Snapshot;
use crate::pipeline::PipelineStage;
use crate::timeline::BureauTimeline;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,  // Expected gap, no action needed
    Warn,  // Data was used but is questionable or partial
    Error, // Data was dropped
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Record or block has the wrong shape and was dropped
    Structural,
    DuplicateRecord,
    MissingCreditReport,
    UndatedReport,
    InvalidDate,
    /// One score or parameter entry could not be read
    MalformedEntry,
    /// Score entry names a different bureau than its report
    BureauMismatch,
    UnrecognizedBureau,
    SameDateSnapshots,
    /// Expected bureau has no dated snapshots
    MissingBureau,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub stage: PipelineStage,
    pub kind: IssueKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub message: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        stage: PipelineStage,
        kind: IssueKind,
        message: impl Into<String>,
    ) -> Self {
        Issue {
            severity,
            stage,
            kind,
            record_id: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn info(stage: PipelineStage, kind: IssueKind, message: impl Into<String>) -> Self {
        Issue::new(Severity::Info, stage, kind, message)
    }

    pub fn warn(stage: PipelineStage, kind: IssueKind, message: impl Into<String>) -> Self {
        Issue::new(Severity::Warn, stage, kind, message)
    }

    pub fn error(stage: PipelineStage, kind: IssueKind, message: impl Into<String>) -> Self {
        Issue::new(Severity::Error, stage, kind, message)
    }

    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity.as_str(), self.stage.as_str(), self.message)?;
        if let Some(record_id) = &self.record_id {
            write!(f, " (record {})", record_id)?;
        }
        Ok(())
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

/// Record-level counts from validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub received: usize,
    pub accepted: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub records: RecordCounts,

    pub reports_extracted: usize,
    pub reports_undated: usize,

    pub parameters_total: usize,
    pub parameters_dated: usize,
    pub parameters_categorized: usize,
    pub parameters_covered: usize,
    pub parameters_unavailable: usize,

    /// Usable fraction of parameters, 0.0 – 1.0
    pub coverage_score: f64,

    pub bureaus_expected: Vec<Bureau>,
    pub bureaus_present: Vec<Bureau>,
    pub bureaus_missing: Vec<Bureau>,

    pub confidence: f64,
    pub needs_review: bool,

    pub info_count: usize,
    pub warn_count: usize,
    pub error_count: usize,

    pub issues: Vec<Issue>,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        format!(
            "Coverage: {:.1}%, Confidence: {:.1}%, Bureaus: {}/{}, Issues: {} ({} errors, {} warnings)",
            self.coverage_score * 100.0,
            self.confidence * 100.0,
            self.bureaus_present
                .iter()
                .filter(|b| self.bureaus_expected.contains(b))
                .count(),
            self.bureaus_expected.len(),
            self.issues.len(),
            self.error_count,
            self.warn_count,
        )
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn is_high_quality(&self) -> bool {
        !self.needs_review && !self.has_errors() && self.bureaus_missing.is_empty()
    }
}

// ============================================================================
// REPORTER
// ============================================================================

pub struct QualityReporter {
    /// Confidence below this flags the analysis for review
    review_threshold: f64,
}

impl QualityReporter {
    pub fn new() -> Self {
        QualityReporter {
            review_threshold: 0.7,
        }
    }

    pub fn with_threshold(review_threshold: f64) -> Self {
        QualityReporter { review_threshold }
    }

    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    /// Aggregate issues and coverage into one report
    pub fn report(
        &self,
        records: RecordCounts,
        snapshots: &[Snapshot],
        timelines: &BTreeMap<Bureau, BureauTimeline>,
        expected_bureaus: &[Bureau],
        issues: Vec<Issue>,
    ) -> QualityReport {
        let mut parameters_total = 0;
        let mut parameters_dated = 0;
        let mut parameters_categorized = 0;
        let mut parameters_covered = 0;
        let mut parameters_unavailable = 0;

        for snapshot in snapshots {
            for parameter in &snapshot.parameters {
                parameters_total += 1;
                if parameter.parameter.is_dated() {
                    parameters_dated += 1;
                }
                if parameter.category != Category::Other {
                    parameters_categorized += 1;
                }
                if !snapshot.undated && parameter.is_covered() {
                    parameters_covered += 1;
                }
                if !parameter.parameter.value.is_available() {
                    parameters_unavailable += 1;
                }
            }
        }

        let coverage_score = if parameters_total == 0 {
            0.0
        } else {
            parameters_covered as f64 / parameters_total as f64
        };

        let bureaus_present: Vec<Bureau> = timelines
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(b, _)| b.clone())
            .collect();
        let bureaus_missing: Vec<Bureau> = expected_bureaus
            .iter()
            .filter(|b| !bureaus_present.contains(b))
            .cloned()
            .collect();

        let bureau_factor = if expected_bureaus.is_empty() {
            1.0
        } else {
            let present = expected_bureaus.len() - bureaus_missing.len();
            (present as f64 / expected_bureaus.len() as f64).min(1.0)
        };

        let confidence = round4(coverage_score * bureau_factor);
        let needs_review = confidence < self.review_threshold;

        let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
        let info_count = count(Severity::Info);
        let warn_count = count(Severity::Warn);
        let error_count = count(Severity::Error);

        let report = QualityReport {
            records,
            reports_extracted: snapshots.len(),
            reports_undated: snapshots.iter().filter(|s| s.undated).count(),
            parameters_total,
            parameters_dated,
            parameters_categorized,
            parameters_covered,
            parameters_unavailable,
            coverage_score: round4(coverage_score),
            bureaus_expected: expected_bureaus.to_vec(),
            bureaus_present,
            bureaus_missing,
            confidence,
            needs_review,
            info_count,
            warn_count,
            error_count,
            issues,
        };

        tracing::debug!(summary = %report.summary(), "quality report");
        report
    }
}

impl Default for QualityReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategorizedParameter, SummaryParameter};
    use crate::sentinel::{MetricValue, UnavailableReason};
    use crate::timeline::build_timeline;
    use chrono::NaiveDate;

    fn parameter(name: &str, category: Category, dated: bool, value: MetricValue) -> CategorizedParameter {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).filter(|_| dated);
        CategorizedParameter {
            parameter: SummaryParameter {
                name: name.to_string(),
                value,
                raw_value: String::new(),
                own_date: None,
                effective_date: date,
            },
            category,
            matched_by: None,
        }
    }

    fn snapshot(bureau: &str, undated: bool, parameters: Vec<CategorizedParameter>) -> Snapshot {
        Snapshot {
            record_id: format!("{}-rec", bureau),
            sequence: 0,
            bureau: Bureau::new(bureau),
            issued_date: if undated {
                None
            } else {
                NaiveDate::from_ymd_opt(2024, 1, 1)
            },
            undated,
            scores: vec![],
            parameters,
        }
    }

    fn timelines(snapshots: &[Snapshot], bureaus: &[&str]) -> BTreeMap<Bureau, BureauTimeline> {
        bureaus
            .iter()
            .map(|b| (Bureau::new(*b), build_timeline(snapshots, &Bureau::new(*b))))
            .collect()
    }

    fn expected() -> Vec<Bureau> {
        vec![
            Bureau::new("Equifax"),
            Bureau::new("Experian"),
            Bureau::new("TransUnion"),
        ]
    }

    #[test]
    fn test_coverage_counts_dated_and_categorized() {
        let snapshots = vec![
            snapshot(
                "Experian",
                false,
                vec![
                    parameter("Utilization", Category::Utilization, true, MetricValue::Number(30.0)),
                    parameter("Mystery", Category::Other, true, MetricValue::Number(1.0)),
                ],
            ),
            snapshot(
                "Equifax",
                true,
                vec![parameter("Utilization", Category::Utilization, false, MetricValue::Number(40.0))],
            ),
        ];

        let report = QualityReporter::new().report(
            RecordCounts::default(),
            &snapshots,
            &timelines(&snapshots, &["Equifax", "Experian", "TransUnion"]),
            &expected(),
            vec![],
        );

        assert_eq!(report.parameters_total, 3);
        assert_eq!(report.parameters_dated, 2);
        assert_eq!(report.parameters_categorized, 2);
        assert_eq!(report.parameters_covered, 1);
        assert_eq!(report.coverage_score, 0.3333);
        assert_eq!(report.reports_undated, 1);
    }

    #[test]
    fn test_confidence_scales_with_bureaus_present() {
        let snapshots = vec![snapshot(
            "Experian",
            false,
            vec![parameter("Utilization", Category::Utilization, true, MetricValue::Number(30.0))],
        )];

        let report = QualityReporter::new().report(
            RecordCounts::default(),
            &snapshots,
            &timelines(&snapshots, &["Equifax", "Experian", "TransUnion"]),
            &expected(),
            vec![],
        );

        assert_eq!(report.coverage_score, 1.0);
        assert_eq!(report.confidence, 0.3333);
        assert!(report.needs_review);
        assert_eq!(report.bureaus_present, vec![Bureau::new("Experian")]);
        assert_eq!(
            report.bureaus_missing,
            vec![Bureau::new("Equifax"), Bureau::new("TransUnion")]
        );
    }

    #[test]
    fn test_zero_parameters_is_zero_coverage() {
        let report = QualityReporter::new().report(
            RecordCounts::default(),
            &[],
            &BTreeMap::new(),
            &expected(),
            vec![],
        );

        assert_eq!(report.coverage_score, 0.0);
        assert_eq!(report.confidence, 0.0);
        assert!(report.needs_review);
    }

    #[test]
    fn test_unavailable_values_counted() {
        let snapshots = vec![snapshot(
            "Experian",
            false,
            vec![parameter(
                "Utilization",
                Category::Utilization,
                true,
                MetricValue::Unavailable(UnavailableReason::Sentinel),
            )],
        )];

        let report = QualityReporter::with_threshold(0.2).report(
            RecordCounts::default(),
            &snapshots,
            &timelines(&snapshots, &["Experian"]),
            &[Bureau::new("Experian")],
            vec![],
        );

        assert_eq!(report.parameters_unavailable, 1);
        // Still covered: the parameter is dated and categorized
        assert_eq!(report.coverage_score, 1.0);
        assert!(!report.needs_review);
        assert!(report.is_high_quality());
    }

    #[test]
    fn test_issue_counts_and_summary() {
        let issues = vec![
            Issue::error(PipelineStage::Validated, IssueKind::Structural, "record #1: no id"),
            Issue::warn(PipelineStage::Extracted, IssueKind::UndatedReport, "undated").with_record("r2"),
            Issue::info(PipelineStage::Extracted, IssueKind::MissingCreditReport, "skipped"),
        ];

        let report = QualityReporter::new().report(
            RecordCounts {
                received: 3,
                accepted: 2,
                excluded: 1,
            },
            &[],
            &BTreeMap::new(),
            &expected(),
            issues,
        );

        assert_eq!((report.info_count, report.warn_count, report.error_count), (1, 1, 1));
        assert!(report.has_errors());
        assert_eq!(report.issues_of(IssueKind::UndatedReport).count(), 1);
        assert_eq!(
            report.summary(),
            "Coverage: 0.0%, Confidence: 0.0%, Bureaus: 0/3, Issues: 3 (1 errors, 1 warnings)"
        );
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::warn(PipelineStage::Extracted, IssueKind::InvalidDate, "bad date")
            .with_record("r9")
            .with_field("issued_date");

        assert_eq!(issue.to_string(), "[WARN] extracted: bad date (record r9)");
        assert_eq!(issue.field.as_deref(), Some("issued_date"));
    }
}
