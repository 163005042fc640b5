// 🏗️ Record Extractor - Credit-report blocks → typed snapshots
//
// Applies the date-inheritance rule and tags sentinel values. After this
// stage nothing reads raw JSON and no sentinel is a number.

use chrono::NaiveDate;
use serde_json::Value;

use crate::bureau::{Bureau, BureauRegistry, Normalized};
use crate::model::{CreditReport, ScoreEntry, SummaryParameter};
use crate::pipeline::PipelineStage;
use crate::quality::{Issue, IssueKind, Severity};
use crate::records::{
    first_present, parse_date, CreditReportBlock, DateField, ParameterBlock, RawParameters, Record,
    ScoreBlock, PARAMETER_DATE_KEYS,
};
use crate::sentinel::MetricValue;

// ============================================================================
// EXTRACTION OUTPUT
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Every extracted report, dated or not, in ingestion order
    pub reports: Vec<CreditReport>,
    pub issues: Vec<Issue>,
}

impl Extraction {
    pub fn undated_count(&self) -> usize {
        self.reports.iter().filter(|r| r.undated).count()
    }
}

// ============================================================================
// RECORD EXTRACTOR
// ============================================================================

pub struct RecordExtractor<'a> {
    registry: &'a BureauRegistry,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(registry: &'a BureauRegistry) -> Self {
        RecordExtractor { registry }
    }

    /// Extract at most one credit report per record.
    ///
    /// Records without a block are skipped; malformed blocks are excluded
    /// with an Error issue. Neither aborts the batch.
    pub fn extract(&self, records: &[Record]) -> Extraction {
        let mut extraction = Extraction::default();

        for record in records {
            let block = match record.credit_report_block() {
                Some(block) => block,
                None => {
                    extraction.issues.push(
                        Issue::info(
                            PipelineStage::Extracted,
                            IssueKind::MissingCreditReport,
                            "record has no credit-report block",
                        )
                        .with_record(&record.id),
                    );
                    continue;
                }
            };

            let sequence = extraction.reports.len();
            if let Some(report) = self.extract_block(record, block, sequence, &mut extraction.issues)
            {
                tracing::debug!(
                    record_id = %record.id,
                    bureau = %report.bureau,
                    undated = report.undated,
                    scores = report.scores.len(),
                    parameters = report.parameters.len(),
                    "extracted credit report"
                );
                extraction.reports.push(report);
            }
        }

        extraction
    }

    fn extract_block(
        &self,
        record: &Record,
        block: &Value,
        sequence: usize,
        issues: &mut Vec<Issue>,
    ) -> Option<CreditReport> {
        let excluded = |message: String| {
            Issue::error(PipelineStage::Extracted, IssueKind::Structural, message)
                .with_record(&record.id)
        };

        if !block.is_object() {
            issues.push(excluded("credit-report block is not an object".to_string()));
            tracing::warn!(record_id = %record.id, "credit-report block is not an object");
            return None;
        }

        let parsed = match CreditReportBlock::from_json(block) {
            Ok(parsed) => parsed,
            Err(e) => {
                issues.push(excluded(format!("malformed credit-report block: {}", e)));
                tracing::warn!(record_id = %record.id, error = %e, "malformed credit-report block");
                return None;
            }
        };

        let bureau = match parsed.bureau.as_deref().and_then(|b| self.registry.normalize(b)) {
            Some(Normalized::Known(bureau)) => bureau,
            Some(Normalized::Unrecognized(bureau)) => {
                issues.push(
                    Issue::info(
                        PipelineStage::Extracted,
                        IssueKind::UnrecognizedBureau,
                        format!("bureau `{}` is not a registered bureau", bureau),
                    )
                    .with_record(&record.id)
                    .with_field("bureau"),
                );
                bureau
            }
            None => {
                issues.push(excluded("credit report has no bureau".to_string()));
                tracing::warn!(record_id = %record.id, "credit report has no bureau");
                return None;
            }
        };

        let issued_date = read_date(
            parsed.issued_date.as_ref(),
            &record.id,
            "issued_date",
            issues,
        );

        let scores = self.extract_scores(&parsed.scores, &bureau, issued_date, &record.id, issues);
        let parameters = match &parsed.summary_parameters {
            Some(raw) => extract_parameters(raw, issued_date, &record.id, issues),
            None => Vec::new(),
        };

        let undated = issued_date.is_none();
        if undated {
            issues.push(
                Issue::warn(
                    PipelineStage::Extracted,
                    IssueKind::UndatedReport,
                    format!(
                        "{} report has no issued date; kept raw but excluded from the timeline",
                        bureau
                    ),
                )
                .with_record(&record.id)
                .with_field("issued_date"),
            );
        }

        Some(CreditReport {
            record_id: record.id.clone(),
            sequence,
            bureau,
            issued_date,
            undated,
            scores,
            parameters,
        })
    }

    fn extract_scores(
        &self,
        raw_scores: &[Value],
        report_bureau: &Bureau,
        issued_date: Option<NaiveDate>,
        record_id: &str,
        issues: &mut Vec<Issue>,
    ) -> Vec<ScoreEntry> {
        let mut scores = Vec::with_capacity(raw_scores.len());

        for (index, raw) in raw_scores.iter().enumerate() {
            let block = match ScoreBlock::from_json(raw) {
                Ok(block) => block,
                Err(e) => {
                    issues.push(
                        Issue::warn(
                            PipelineStage::Extracted,
                            IssueKind::MalformedEntry,
                            format!("score entry #{} dropped: {}", index, e),
                        )
                        .with_record(record_id)
                        .with_field("scores"),
                    );
                    continue;
                }
            };

            let (value, raw_value) = MetricValue::from_json(block.score.as_ref());
            let own_date = read_date(block.date.as_ref(), record_id, "scores.date", issues);

            let bureau = match block.bureau.as_deref().and_then(|b| self.registry.normalize(b)) {
                Some(normalized) if normalized.bureau() != report_bureau => {
                    issues.push(
                        Issue::warn(
                            PipelineStage::Extracted,
                            IssueKind::BureauMismatch,
                            format!(
                                "score entry #{} names {} inside a {} report",
                                index,
                                normalized.bureau(),
                                report_bureau
                            ),
                        )
                        .with_record(record_id)
                        .with_field("scores.bureau"),
                    );
                    normalized.into_bureau()
                }
                _ => report_bureau.clone(),
            };

            scores.push(ScoreEntry {
                value,
                raw_value,
                model: block.model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
                bureau,
                own_date,
                effective_date: own_date.or(issued_date),
            });
        }

        scores
    }
}

/// Extract with the default bureau registry
pub fn extract_credit_reports(records: &[Record]) -> Extraction {
    let registry = BureauRegistry::new();
    RecordExtractor::new(&registry).extract(records)
}

// ============================================================================
// HELPERS
// ============================================================================

fn extract_parameters(
    raw: &RawParameters,
    issued_date: Option<NaiveDate>,
    record_id: &str,
    issues: &mut Vec<Issue>,
) -> Vec<SummaryParameter> {
    let blocks: Vec<(usize, Result<ParameterBlock, String>)> = match raw {
        RawParameters::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                (i, ParameterBlock::from_json(item).map_err(|e| e.to_string()))
            })
            .collect(),
        RawParameters::Map(map) => map
            .iter()
            .enumerate()
            .map(|(i, (name, value))| (i, Ok(parameter_from_entry(name, value))))
            .collect(),
    };

    let mut parameters = Vec::with_capacity(blocks.len());

    for (index, block) in blocks {
        let block = match block {
            Ok(block) => block,
            Err(e) => {
                issues.push(
                    Issue::warn(
                        PipelineStage::Extracted,
                        IssueKind::MalformedEntry,
                        format!("summary parameter #{} dropped: {}", index, e),
                    )
                    .with_record(record_id)
                    .with_field("summary_parameters"),
                );
                continue;
            }
        };

        let name = match block.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                issues.push(
                    Issue::warn(
                        PipelineStage::Extracted,
                        IssueKind::MalformedEntry,
                        format!("summary parameter #{} dropped: no name", index),
                    )
                    .with_record(record_id)
                    .with_field("summary_parameters"),
                );
                continue;
            }
        };

        let (value, raw_value) = MetricValue::from_json(block.value.as_ref());
        let own_date = read_date(block.date.as_ref(), record_id, "summary_parameters.date", issues);

        parameters.push(SummaryParameter {
            name,
            value,
            raw_value,
            own_date,
            effective_date: own_date.or(issued_date),
        });
    }

    parameters
}

/// Map form: `"name": value` or `"name": {"value": .., "date": ..}`
fn parameter_from_entry(name: &str, value: &Value) -> ParameterBlock {
    match value {
        Value::Object(inner) if inner.contains_key("value") => ParameterBlock {
            name: Some(name.to_string()),
            value: inner.get("value").cloned(),
            date: first_present(inner, &PARAMETER_DATE_KEYS).map(|(_, v)| v.clone()),
        },
        other => ParameterBlock {
            name: Some(name.to_string()),
            value: Some(other.clone()),
            date: None,
        },
    }
}

/// Parse a date field; an unparseable date counts as missing and is reported
fn read_date(
    value: Option<&Value>,
    record_id: &str,
    field: &str,
    issues: &mut Vec<Issue>,
) -> Option<NaiveDate> {
    match parse_date(value) {
        DateField::Present(date) => Some(date),
        DateField::Absent => None,
        DateField::Invalid(text) => {
            issues.push(
                Issue::new(
                    Severity::Warn,
                    PipelineStage::Extracted,
                    IssueKind::InvalidDate,
                    format!("unrecognized date `{}` treated as missing", text),
                )
                .with_record(record_id)
                .with_field(field),
            );
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
