// 🔄 Analysis Pipeline - Strictly forward state machine + the Engine that drives it
//
// Received → Validated → Extracted → Categorized → Timelined → Synthesized → Reported
//
// Each stage consumes only the previous stage's output. The Engine holds the
// immutable CategoryTable and settings; analyze() builds a fresh analysis
// per call and touches nothing else.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::ComparativeAnalysis;
use crate::bureau::{Bureau, BureauRegistry, Normalized};
use crate::categorizer::{categorize_reports, CategoryTable};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, TableError};
use crate::extractor::RecordExtractor;
use crate::quality::{Issue, QualityReporter, RecordCounts, Severity};
use crate::records::Entity;
use crate::synthesizer::{compare, SynthesisOptions};
use crate::timeline::build_timelines;
use crate::validator::{validate_entity_id, validate_records};

// ============================================================================
// PIPELINE STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Validated,
    Extracted,
    Categorized,
    Timelined,
    Synthesized,
    Reported,
}

impl PipelineStage {
    /// The only stage this one may advance to
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Received => Some(PipelineStage::Validated),
            PipelineStage::Validated => Some(PipelineStage::Extracted),
            PipelineStage::Extracted => Some(PipelineStage::Categorized),
            PipelineStage::Categorized => Some(PipelineStage::Timelined),
            PipelineStage::Timelined => Some(PipelineStage::Synthesized),
            PipelineStage::Synthesized => Some(PipelineStage::Reported),
            PipelineStage::Reported => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Extracted => "extracted",
            PipelineStage::Categorized => "categorized",
            PipelineStage::Timelined => "timelined",
            PipelineStage::Synthesized => "synthesized",
            PipelineStage::Reported => "reported",
        }
    }
}

/// Current position of one request in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    stage: PipelineStage,
}

impl PipelineState {
    pub fn new() -> Self {
        PipelineState {
            stage: PipelineStage::Received,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Move exactly one stage forward; anything else is an invariant violation
    pub fn advance(&mut self, to: PipelineStage) -> Result<(), AnalysisError> {
        if self.stage.next() != Some(to) {
            return Err(AnalysisError::StageTransition {
                from: self.stage,
                to,
            });
        }

        tracing::trace!(from = self.stage.as_str(), to = to.as_str(), "pipeline stage");
        self.stage = to;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.stage == PipelineStage::Reported
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    table: CategoryTable,
    registry: BureauRegistry,
    expected_bureaus: Vec<Bureau>,
    options: SynthesisOptions,
    reporter: QualityReporter,
}

impl Engine {
    /// Engine over an injected category table, with default settings
    pub fn new(table: CategoryTable) -> Self {
        let defaults = EngineConfig::default();
        let registry = BureauRegistry::new();
        Engine {
            table,
            expected_bureaus: normalize_bureaus(&registry, &defaults.analysis.expected_bureaus),
            registry,
            options: SynthesisOptions {
                include_percent_change: defaults.analysis.include_percent_change,
            },
            reporter: QualityReporter::with_threshold(defaults.analysis.review_threshold),
        }
    }

    /// Built-in table, default settings
    pub fn standard() -> Self {
        Self::new(CategoryTable::standard())
    }

    /// Load the category table named by the config and apply its settings
    pub fn from_config(config: &EngineConfig) -> Result<Self, TableError> {
        let mut table = match &config.categories.rules_path {
            Some(path) => CategoryTable::from_json_file(path)?,
            None => CategoryTable::standard(),
        };
        if let Some(path) = &config.categories.catalog_path {
            table = table.with_catalog_file(path)?;
        }

        tracing::debug!(
            rules = table.rule_count(),
            catalog = table.catalog_len(),
            "loaded category table"
        );

        Ok(Self::new(table)
            .with_expected_bureaus(config.analysis.expected_bureaus.clone())
            .with_options(SynthesisOptions {
                include_percent_change: config.analysis.include_percent_change,
            })
            .with_review_threshold(config.analysis.review_threshold))
    }

    /// Expected bureaus are normalized through the registry, so `TU` and
    /// `TransUnion` name the same timeline.
    pub fn with_expected_bureaus(mut self, expected_bureaus: Vec<Bureau>) -> Self {
        self.expected_bureaus = normalize_bureaus(&self.registry, &expected_bureaus);
        self
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_review_threshold(mut self, review_threshold: f64) -> Self {
        self.reporter = QualityReporter::with_threshold(review_threshold);
        self
    }

    pub fn with_registry(mut self, registry: BureauRegistry) -> Self {
        self.expected_bureaus = normalize_bureaus(&registry, &self.expected_bureaus);
        self.registry = registry;
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn expected_bureaus(&self) -> &[Bureau] {
        &self.expected_bureaus
    }

    /// Run the whole pipeline for one entity.
    ///
    /// Fails only on a malformed entity id or an empty / non-list record
    /// input; every other problem is an issue in the returned quality report.
    pub fn analyze(
        &self,
        entity_id: &str,
        records: &Value,
    ) -> Result<ComparativeAnalysis, AnalysisError> {
        let mut state = PipelineState::new();

        // Received → Validated
        let entity = validate_entity_id(entity_id)?;
        let validated = validate_records(records)?;
        state.advance(PipelineStage::Validated)?;

        let counts = RecordCounts {
            received: validated.received,
            accepted: validated.records.len(),
            excluded: validated.excluded_count(),
        };
        tracing::debug!(
            entity_id = %entity,
            received = counts.received,
            accepted = counts.accepted,
            excluded = counts.excluded,
            "validated records"
        );

        let mut issues: Vec<Issue> = Vec::new();
        for warning in &validated.warnings {
            if warning.severity == Severity::Error {
                tracing::warn!(
                    entity_id = %entity,
                    position = warning.position,
                    "excluded record: {}",
                    warning.message
                );
            }
            issues.push(warning.clone().into_issue());
        }

        // Validated → Extracted
        let extraction = RecordExtractor::new(&self.registry).extract(&validated.records);
        state.advance(PipelineStage::Extracted)?;
        tracing::debug!(
            entity_id = %entity,
            reports = extraction.reports.len(),
            undated = extraction.undated_count(),
            "extracted credit reports"
        );
        issues.extend(extraction.issues);

        // Extracted → Categorized
        let snapshots = categorize_reports(extraction.reports, &self.table);
        state.advance(PipelineStage::Categorized)?;

        // Categorized → Timelined
        let timelines = build_timelines(&snapshots, &self.expected_bureaus);
        state.advance(PipelineStage::Timelined)?;
        issues.extend(timelines.issues);

        // Timelined → Synthesized
        let deltas = compare(&timelines.per_bureau, self.options);
        state.advance(PipelineStage::Synthesized)?;

        // Synthesized → Reported
        let quality = self.reporter.report(
            counts,
            &snapshots,
            &timelines.per_bureau,
            &self.expected_bureaus,
            issues,
        );
        let undated_reports = snapshots.into_iter().filter(|s| s.undated).collect();
        state.advance(PipelineStage::Reported)?;

        let analysis = ComparativeAnalysis::new(
            entity,
            timelines.per_bureau,
            deltas,
            undated_reports,
            quality,
        );

        tracing::info!(
            entity_id = %entity,
            confidence = analysis.quality().confidence,
            needs_review = analysis.quality().needs_review,
            "{}",
            analysis.summary()
        );

        Ok(analysis)
    }

    /// Same as analyze, reading id and records from an envelope
    pub fn analyze_entity(&self, entity: &Entity) -> Result<ComparativeAnalysis, AnalysisError> {
        self.analyze(&entity.id, &entity.records)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::standard()
    }
}

/// Canonical names in first-seen order; blanks and duplicates dropped
fn normalize_bureaus(registry: &BureauRegistry, bureaus: &[Bureau]) -> Vec<Bureau> {
    let mut normalized: Vec<Bureau> = Vec::with_capacity(bureaus.len());
    for bureau in bureaus {
        if let Some(canonical) = registry.normalize(bureau.as_str()).map(Normalized::into_bureau) {
            if !normalized.contains(&canonical) {
                normalized.push(canonical);
            }
        }
    }
    normalized
}

// ============================================================================
// TESTS
// ============================================================================
