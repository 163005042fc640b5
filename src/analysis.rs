// 📊 Comparative Analysis - Final immutable output of one request
//
// Built once by the pipeline and never mutated. Every collection is ordered
// (BTreeMap / Vec in ingestion or bureau-name order) so the same input always
// serializes to the same bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::bureau::Bureau;
use crate::model::Snapshot;
use crate::quality::QualityReport;
use crate::synthesizer::Delta;
use crate::timeline::BureauTimeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeAnalysis {
    entity_id: Uuid,
    per_bureau: BTreeMap<Bureau, BureauTimeline>,
    cross_bureau_deltas: Vec<Delta>,

    /// Retained raw, never placed on a timeline
    undated_reports: Vec<Snapshot>,

    quality: QualityReport,
}

impl ComparativeAnalysis {
    pub(crate) fn new(
        entity_id: Uuid,
        per_bureau: BTreeMap<Bureau, BureauTimeline>,
        cross_bureau_deltas: Vec<Delta>,
        undated_reports: Vec<Snapshot>,
        quality: QualityReport,
    ) -> Self {
        ComparativeAnalysis {
            entity_id,
            per_bureau,
            cross_bureau_deltas,
            undated_reports,
            quality,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn per_bureau(&self) -> &BTreeMap<Bureau, BureauTimeline> {
        &self.per_bureau
    }

    pub fn timeline(&self, bureau: &Bureau) -> Option<&BureauTimeline> {
        self.per_bureau.get(bureau)
    }

    pub fn cross_bureau_deltas(&self) -> &[Delta] {
        &self.cross_bureau_deltas
    }

    pub fn undated_reports(&self) -> &[Snapshot] {
        &self.undated_reports
    }

    pub fn quality(&self) -> &QualityReport {
        &self.quality
    }

    /// Canonical JSON (compact, field order fixed by the type definitions)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// SHA-256 of the canonical JSON, lowercase hex
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn summary(&self) -> String {
        let available = self
            .cross_bureau_deltas
            .iter()
            .filter(|d| d.is_available())
            .count();

        format!(
            "entity {}: {} bureaus, {} deltas ({} available), {} undated | {}",
            self.entity_id,
            self.per_bureau.values().filter(|t| !t.is_empty()).count(),
            self.cross_bureau_deltas.len(),
            available,
            self.undated_reports.len(),
            self.quality.summary()
        )
    }
}
