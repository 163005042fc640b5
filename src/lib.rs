// Bureau Lens - Multi-Bureau Temporal Credit Analysis Engine
// Exposes the pipeline stages for use in the CLI and tests

pub mod error;
pub mod sentinel;       // Tagged numeric values (sentinels never become numbers)
pub mod bureau;         // Bureau identity + alias registry
pub mod records;        // Typed input IR
pub mod model;          // Extracted domain types
pub mod validator;      // Stage 1: Input Validator
pub mod extractor;      // Stage 2: Record Extractor
pub mod categorizer;    // Stage 3: Summary Parameter Categorizer
pub mod timeline;       // Stage 4: Temporal Timeline Builder
pub mod synthesizer;    // Stage 5: Cross-Bureau Synthesizer
pub mod quality;        // Stage 6: Quality & Validation Reporter
pub mod analysis;
pub mod pipeline;
pub mod config;

// Re-export commonly used types
pub use error::{AnalysisError, EmptyTimelineError, TableError};
pub use sentinel::{MetricValue, UnavailableReason, SENTINEL_CODES, SENTINEL_TEXT};
pub use bureau::{Bureau, BureauProfile, BureauRegistry, Normalized};
pub use records::{Entity, Record};
pub use model::{CategorizedParameter, CreditReport, ScoreEntry, Snapshot, SummaryParameter};
pub use validator::{validate_entity_id, validate_records, StructuralWarning, ValidatedRecords};
pub use extractor::{extract_credit_reports, Extraction, RecordExtractor};
pub use categorizer::{
    categorize, categorize_reports, Category, CategoryTable, Classification, KeywordRule,
};
pub use timeline::{build_timeline, build_timelines, first, latest, BureauTimeline, Timelines};
pub use synthesizer::{compare, metric_value, Delta, DeltaScope, Metric, SynthesisOptions};
pub use quality::{Issue, IssueKind, QualityReport, QualityReporter, RecordCounts, Severity};
pub use analysis::ComparativeAnalysis;
pub use pipeline::{Engine, PipelineStage, PipelineState};
pub use config::{ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
