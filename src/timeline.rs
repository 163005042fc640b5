// ⏰ Temporal Timeline Builder - Per-bureau chronological snapshots
//
// Only dated snapshots are ordered. Ordering is a stable ascending sort on
// the issued date, so same-date snapshots keep ingestion order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bureau::Bureau;
use crate::error::EmptyTimelineError;
use crate::model::Snapshot;
use crate::pipeline::PipelineStage;
use crate::quality::{Issue, IssueKind};

// ============================================================================
// BUREAU TIMELINE
// ============================================================================

/// One bureau's dated snapshots, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BureauTimeline {
    pub bureau: Bureau,
    pub entries: Vec<Snapshot>,
}

impl BureauTimeline {
    pub fn empty(bureau: Bureau) -> Self {
        BureauTimeline {
            bureau,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest snapshot
    pub fn first(&self) -> Result<&Snapshot, EmptyTimelineError> {
        self.entries.first().ok_or_else(|| EmptyTimelineError {
            bureau: self.bureau.clone(),
        })
    }

    /// Most recent snapshot (last among same-date ties)
    pub fn latest(&self) -> Result<&Snapshot, EmptyTimelineError> {
        self.entries.last().ok_or_else(|| EmptyTimelineError {
            bureau: self.bureau.clone(),
        })
    }

    /// Dates covered, oldest → newest
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.entries.first()?.issued_date?;
        let last = self.entries.last()?.issued_date?;
        Some((first, last))
    }

    /// Snapshot in effect on a given day (latest issued on or before it)
    pub fn as_of(&self, day: NaiveDate) -> Option<&Snapshot> {
        self.entries
            .iter()
            .rev()
            .find(|s| s.issued_date.map_or(false, |d| d <= day))
    }
}

/// Earliest entry of a timeline
pub fn first(timeline: &BureauTimeline) -> Result<&Snapshot, EmptyTimelineError> {
    timeline.first()
}

/// Most recent entry of a timeline
pub fn latest(timeline: &BureauTimeline) -> Result<&Snapshot, EmptyTimelineError> {
    timeline.latest()
}

// ============================================================================
// BUILDERS
// ============================================================================

/// Filter by bureau, drop undated snapshots, stable-sort ascending by date
pub fn build_timeline(snapshots: &[Snapshot], bureau: &Bureau) -> BureauTimeline {
    let mut entries: Vec<Snapshot> = snapshots
        .iter()
        .filter(|s| &s.bureau == bureau && !s.undated && s.issued_date.is_some())
        .cloned()
        .collect();

    // sort_by_key is stable
    entries.sort_by_key(|s| s.issued_date);

    BureauTimeline {
        bureau: bureau.clone(),
        entries,
    }
}

/// Timelines produced for one request
#[derive(Debug, Clone, Default)]
pub struct Timelines {
    pub per_bureau: BTreeMap<Bureau, BureauTimeline>,
    pub issues: Vec<Issue>,
}

/// Build a timeline for every expected and every observed bureau.
///
/// Expected bureaus with no data get an empty timeline (and a Warn issue)
/// so the synthesizer can mark their deltas unavailable.
pub fn build_timelines(snapshots: &[Snapshot], expected: &[Bureau]) -> Timelines {
    let mut bureaus: Vec<Bureau> = expected.to_vec();
    for snapshot in snapshots {
        if !bureaus.contains(&snapshot.bureau) {
            bureaus.push(snapshot.bureau.clone());
        }
    }

    let mut timelines = Timelines::default();

    for bureau in bureaus {
        let timeline = build_timeline(snapshots, &bureau);

        if timeline.is_empty() {
            let has_undated = snapshots.iter().any(|s| s.bureau == bureau && s.undated);
            let message = if has_undated {
                format!("{} has only undated snapshots", bureau)
            } else {
                format!("no {} data in any record", bureau)
            };
            timelines.issues.push(Issue::warn(
                PipelineStage::Timelined,
                IssueKind::MissingBureau,
                message,
            ));
        }

        for pair in timeline.entries.windows(2) {
            if pair[0].issued_date == pair[1].issued_date {
                timelines.issues.push(
                    Issue::info(
                        PipelineStage::Timelined,
                        IssueKind::SameDateSnapshots,
                        format!(
                            "{} snapshots from records {} and {} share a date; ingestion order kept",
                            bureau, pair[0].record_id, pair[1].record_id
                        ),
                    )
                    .with_record(&pair[1].record_id),
                );
            }
        }

        tracing::debug!(bureau = %bureau, entries = timeline.len(), "built bureau timeline");
        timelines.per_bureau.insert(bureau, timeline);
    }

    timelines
}

// ============================================================================
// TESTS
// ============================================================================
