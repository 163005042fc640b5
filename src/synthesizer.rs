// ⚖️ Cross-Bureau Synthesizer - Deltas that never confuse "no data" with "no change"
//
// Trend:        latest(bureau) - earliest(bureau)
// Cross-bureau: latest(A) - latest(B), for every pair A < B
//
// A missing bureau, a sentinel, or a zero percent-change base all yield an
// Unavailable value with a reason. Nothing is synthesized as zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bureau::Bureau;
use crate::categorizer::Category;
use crate::model::Snapshot;
use crate::sentinel::{MetricValue, UnavailableReason};
use crate::timeline::BureauTimeline;

/// Name fragments that mark a delinquency parameter as not being a count
const NON_COUNT_MARKERS: [&str; 8] = [
    "since", "amount", "balance", "ratio", "percent", "%", "worst", "$",
];

// ============================================================================
// METRIC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Score,
    Utilization,
    DelinquencyCount,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Score, Metric::Utilization, Metric::DelinquencyCount];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Score => "score",
            Metric::Utilization => "utilization",
            Metric::DelinquencyCount => "delinquency_count",
        }
    }
}

/// Read one metric off a snapshot
pub fn metric_value(snapshot: &Snapshot, metric: Metric) -> MetricValue {
    match metric {
        // Entries flagged for another bureau never stand in for this one
        Metric::Score => snapshot
            .scores
            .iter()
            .find(|s| s.bureau == snapshot.bureau)
            .map(|s| s.value)
            .unwrap_or(MetricValue::Unavailable(UnavailableReason::Missing)),

        Metric::Utilization => snapshot
            .parameters_in(Category::Utilization)
            .next()
            .map(|p| p.parameter.value)
            .unwrap_or(MetricValue::Unavailable(UnavailableReason::Missing)),

        Metric::DelinquencyCount => {
            let counts: Vec<MetricValue> = snapshot
                .parameters_in(Category::Delinquency)
                .filter(|p| is_count_like(&p.parameter.name))
                .map(|p| p.parameter.value)
                .collect();

            if counts.is_empty() {
                return MetricValue::Unavailable(UnavailableReason::Missing);
            }

            // One unavailable component makes the total unavailable
            let mut total = 0.0;
            for value in counts {
                match value {
                    MetricValue::Number(n) => total += n,
                    unavailable => return unavailable,
                }
            }
            MetricValue::Number(total)
        }
    }
}

fn is_count_like(name: &str) -> bool {
    let lower = name.to_lowercase();
    !NON_COUNT_MARKERS.iter().any(|m| lower.contains(m))
}

// ============================================================================
// DELTA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaScope {
    /// Change within one bureau, earliest → latest
    Trend { bureau: Bureau },
    /// Latest of `subject` compared against latest of `baseline`
    CrossBureau { subject: Bureau, baseline: Bureau },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub scope: DeltaScope,
    pub metric: Metric,

    pub baseline: MetricValue,
    pub baseline_date: Option<NaiveDate>,
    pub subject: MetricValue,
    pub subject_date: Option<NaiveDate>,

    /// subject - baseline
    pub change: MetricValue,

    /// Only present when percent change was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<MetricValue>,
}

impl Delta {
    pub fn is_available(&self) -> bool {
        self.change.is_available()
    }

    /// True only for a confirmed zero change between two real numbers
    pub fn is_confirmed_no_change(&self) -> bool {
        self.change == MetricValue::Number(0.0)
    }

    pub fn involves(&self, bureau: &Bureau) -> bool {
        match &self.scope {
            DeltaScope::Trend { bureau: b } => b == bureau,
            DeltaScope::CrossBureau { subject, baseline } => subject == bureau || baseline == bureau,
        }
    }
}

// ============================================================================
// SYNTHESIS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    pub include_percent_change: bool,
}

/// Side of a comparison: value + date, or why there is none
struct Side {
    value: MetricValue,
    date: Option<NaiveDate>,
}

impl Side {
    fn of(snapshot: &Snapshot, metric: Metric) -> Self {
        Side {
            value: metric_value(snapshot, metric),
            date: snapshot.issued_date,
        }
    }

    fn unavailable(reason: UnavailableReason) -> Self {
        Side {
            value: MetricValue::Unavailable(reason),
            date: None,
        }
    }
}

/// All trend deltas, then all cross-bureau deltas, in bureau-name order
pub fn compare(
    timelines: &BTreeMap<Bureau, BureauTimeline>,
    options: SynthesisOptions,
) -> Vec<Delta> {
    let mut deltas = Vec::new();

    for (bureau, timeline) in timelines {
        for metric in Metric::ALL {
            let (baseline, subject) = match (timeline.first(), timeline.latest()) {
                (Ok(_), Ok(_)) if timeline.len() < 2 => (
                    Side::unavailable(UnavailableReason::InsufficientHistory),
                    Side::unavailable(UnavailableReason::InsufficientHistory),
                ),
                (Ok(earliest), Ok(latest)) => (Side::of(earliest, metric), Side::of(latest, metric)),
                _ => (
                    Side::unavailable(UnavailableReason::NoData),
                    Side::unavailable(UnavailableReason::NoData),
                ),
            };

            deltas.push(build_delta(
                DeltaScope::Trend {
                    bureau: bureau.clone(),
                },
                metric,
                baseline,
                subject,
                options,
            ));
        }
    }

    let bureaus: Vec<&Bureau> = timelines.keys().collect();
    for (i, subject_bureau) in bureaus.iter().enumerate() {
        for baseline_bureau in &bureaus[i + 1..] {
            let subject_latest = timelines[*subject_bureau].latest().ok();
            let baseline_latest = timelines[*baseline_bureau].latest().ok();

            for metric in Metric::ALL {
                let subject = subject_latest
                    .map(|s| Side::of(s, metric))
                    .unwrap_or_else(|| Side::unavailable(UnavailableReason::NoData));
                let baseline = baseline_latest
                    .map(|s| Side::of(s, metric))
                    .unwrap_or_else(|| Side::unavailable(UnavailableReason::NoData));

                deltas.push(build_delta(
                    DeltaScope::CrossBureau {
                        subject: (*subject_bureau).clone(),
                        baseline: (*baseline_bureau).clone(),
                    },
                    metric,
                    baseline,
                    subject,
                    options,
                ));
            }
        }
    }

    tracing::debug!(
        deltas = deltas.len(),
        available = deltas.iter().filter(|d| d.is_available()).count(),
        "synthesized deltas"
    );

    deltas
}

fn build_delta(
    scope: DeltaScope,
    metric: Metric,
    baseline: Side,
    subject: Side,
    options: SynthesisOptions,
) -> Delta {
    let change = difference(subject.value, baseline.value);
    let percent_change = options
        .include_percent_change
        .then(|| percent_change(change, baseline.value));

    Delta {
        scope,
        metric,
        baseline: baseline.value,
        baseline_date: baseline.date,
        subject: subject.value,
        subject_date: subject.date,
        change,
        percent_change,
    }
}

/// subject - baseline.
///
/// NoData on either side wins, so an absent bureau is never reported as a
/// gap in the bureau that is present. Otherwise the subject's reason wins.
pub fn difference(subject: MetricValue, baseline: MetricValue) -> MetricValue {
    match (subject, baseline) {
        (MetricValue::Number(s), MetricValue::Number(b)) => {
            finite_or(round4(s - b), UnavailableReason::Unparseable)
        }
        (subject, baseline) => MetricValue::Unavailable(unavailable_reason(subject, baseline)),
    }
}

/// change / |base| × 100; a zero base is unavailable, never NaN or infinity
pub fn percent_change(change: MetricValue, base: MetricValue) -> MetricValue {
    match (change, base) {
        (MetricValue::Number(_), MetricValue::Number(b)) if b == 0.0 => {
            MetricValue::Unavailable(UnavailableReason::ZeroDenominator)
        }
        (MetricValue::Number(c), MetricValue::Number(b)) => {
            finite_or(round4(c / b.abs() * 100.0), UnavailableReason::ZeroDenominator)
        }
        (change, base) => MetricValue::Unavailable(unavailable_reason(change, base)),
    }
}

fn unavailable_reason(first: MetricValue, second: MetricValue) -> UnavailableReason {
    match (first, second) {
        (MetricValue::Unavailable(UnavailableReason::NoData), _)
        | (_, MetricValue::Unavailable(UnavailableReason::NoData)) => UnavailableReason::NoData,
        (MetricValue::Unavailable(reason), _) | (_, MetricValue::Unavailable(reason)) => reason,
        // Both numbers; callers handle that case before asking
        (MetricValue::Number(_), MetricValue::Number(_)) => UnavailableReason::Unparseable,
    }
}

fn finite_or(value: f64, reason: UnavailableReason) -> MetricValue {
    if value.is_finite() {
        MetricValue::Number(value)
    } else {
        MetricValue::Unavailable(reason)
    }
}

/// Round to 4 decimals; magnitudes too large to scale have no fraction left
fn round4(value: f64) -> f64 {
    let scaled = value * 10_000.0;
    if scaled.is_finite() {
        scaled.round() / 10_000.0
    } else {
        value
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategorizedParameter, ScoreEntry, SummaryParameter};
    use crate::timeline::build_timeline;

    fn day(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    fn parameter(name: &str, category: Category, value: MetricValue) -> CategorizedParameter {
        CategorizedParameter {
            parameter: SummaryParameter {
                name: name.to_string(),
                value,
                raw_value: String::new(),
                own_date: None,
                effective_date: None,
            },
            category,
            matched_by: None,
        }
    }

    fn snapshot(
        bureau: &str,
        date: &str,
        score: Option<f64>,
        parameters: Vec<CategorizedParameter>,
    ) -> Snapshot {
        let bureau = Bureau::new(bureau);
        Snapshot {
            record_id: format!("{}-{}", bureau, date),
            sequence: 0,
            bureau: bureau.clone(),
            issued_date: Some(day(date)),
            undated: false,
            scores: score
                .map(|s| ScoreEntry {
                    value: MetricValue::Number(s),
                    raw_value: s.to_string(),
                    model: None,
                    bureau,
                    own_date: None,
                    effective_date: Some(day(date)),
                })
                .into_iter()
                .collect(),
            parameters,
        }
    }

    fn timelines(snapshots: &[Snapshot], bureaus: &[&str]) -> BTreeMap<Bureau, BureauTimeline> {
        bureaus
            .iter()
            .map(|b| {
                let bureau = Bureau::new(*b);
                (bureau.clone(), build_timeline(snapshots, &bureau))
            })
            .collect()
    }

    fn find<'a>(deltas: &'a [Delta], scope: &DeltaScope, metric: Metric) -> &'a Delta {
        deltas
            .iter()
            .find(|d| &d.scope == scope && d.metric == metric)
            .unwrap()
    }

    #[test]
    fn test_score_trend() {
        let snapshots = vec![
            snapshot("Experian", "2024-01-01", Some(600.0), vec![]),
            snapshot("Experian", "2024-06-01", Some(650.0), vec![]),
        ];

        let deltas = compare(&timelines(&snapshots, &["Experian"]), SynthesisOptions::default());
        let trend = find(
            &deltas,
            &DeltaScope::Trend {
                bureau: Bureau::new("Experian"),
            },
            Metric::Score,
        );

        assert_eq!(trend.change, MetricValue::Number(50.0));
        assert_eq!(trend.baseline_date, Some(day("2024-01-01")));
        assert_eq!(trend.subject_date, Some(day("2024-06-01")));
        assert_eq!(trend.percent_change, None);
    }

    #[test]
    fn test_missing_bureau_is_unavailable_not_zero() {
        let snapshots = vec![snapshot("Experian", "2024-01-01", Some(600.0), vec![])];

        let deltas = compare(
            &timelines(&snapshots, &["Equifax", "Experian"]),
            SynthesisOptions::default(),
        );
        let cross = find(
            &deltas,
            &DeltaScope::CrossBureau {
                subject: Bureau::new("Equifax"),
                baseline: Bureau::new("Experian"),
            },
            Metric::Score,
        );

        assert_eq!(cross.change, MetricValue::Unavailable(UnavailableReason::NoData));
        assert_eq!(cross.baseline, MetricValue::Number(600.0));
        assert!(!cross.is_confirmed_no_change());

        for delta in deltas.iter().filter(|d| d.involves(&Bureau::new("Equifax"))) {
            assert!(!delta.is_available());
        }
    }

    #[test]
    fn test_confirmed_no_change_differs_from_unavailable() {
        let snapshots = vec![
            snapshot("Equifax", "2024-01-01", Some(700.0), vec![]),
            snapshot("Experian", "2024-01-01", Some(700.0), vec![]),
        ];

        let deltas = compare(
            &timelines(&snapshots, &["Equifax", "Experian"]),
            SynthesisOptions::default(),
        );
        let cross = find(
            &deltas,
            &DeltaScope::CrossBureau {
                subject: Bureau::new("Equifax"),
                baseline: Bureau::new("Experian"),
            },
            Metric::Score,
        );

        assert!(cross.is_confirmed_no_change());
    }

    #[test]
    fn test_single_snapshot_trend_is_insufficient_history() {
        let snapshots = vec![snapshot("Experian", "2024-01-01", Some(600.0), vec![])];

        let deltas = compare(&timelines(&snapshots, &["Experian"]), SynthesisOptions::default());

        assert_eq!(deltas.len(), 3);
        for delta in &deltas {
            assert_eq!(
                delta.change,
                MetricValue::Unavailable(UnavailableReason::InsufficientHistory)
            );
        }
    }

    #[test]
    fn test_sentinel_propagates_through_delta() {
        let snapshots = vec![
            snapshot(
                "Experian",
                "2024-01-01",
                None,
                vec![parameter(
                    "Revolving utilization",
                    Category::Utilization,
                    MetricValue::Number(30.0),
                )],
            ),
            snapshot(
                "Experian",
                "2024-06-01",
                None,
                vec![parameter(
                    "Revolving utilization",
                    Category::Utilization,
                    MetricValue::Unavailable(UnavailableReason::Sentinel),
                )],
            ),
        ];

        let deltas = compare(
            &timelines(&snapshots, &["Experian"]),
            SynthesisOptions {
                include_percent_change: true,
            },
        );
        let trend = find(
            &deltas,
            &DeltaScope::Trend {
                bureau: Bureau::new("Experian"),
            },
            Metric::Utilization,
        );

        assert_eq!(trend.change, MetricValue::Unavailable(UnavailableReason::Sentinel));
        assert_eq!(
            trend.percent_change,
            Some(MetricValue::Unavailable(UnavailableReason::Sentinel))
        );

        let score = find(
            &deltas,
            &DeltaScope::Trend {
                bureau: Bureau::new("Experian"),
            },
            Metric::Score,
        );
        assert_eq!(score.change, MetricValue::Unavailable(UnavailableReason::Missing));
    }

    #[test]
    fn test_percent_change_guards_zero_base() {
        assert_eq!(
            percent_change(MetricValue::Number(5.0), MetricValue::Number(0.0)),
            MetricValue::Unavailable(UnavailableReason::ZeroDenominator)
        );
        assert_eq!(
            percent_change(MetricValue::Number(0.0), MetricValue::Number(-0.0)),
            MetricValue::Unavailable(UnavailableReason::ZeroDenominator)
        );
        assert_eq!(
            percent_change(MetricValue::Number(50.0), MetricValue::Number(600.0)),
            MetricValue::Number(8.3333)
        );
        assert_eq!(
            percent_change(MetricValue::Number(-10.0), MetricValue::Number(-40.0)),
            MetricValue::Number(-25.0)
        );
    }

    #[test]
    fn test_percent_change_on_delinquency_from_zero() {
        let snapshots = vec![
            snapshot(
                "Equifax",
                "2024-01-01",
                None,
                vec![parameter("Delinquent accounts", Category::Delinquency, MetricValue::Number(0.0))],
            ),
            snapshot(
                "Equifax",
                "2024-06-01",
                None,
                vec![parameter("Delinquent accounts", Category::Delinquency, MetricValue::Number(2.0))],
            ),
        ];

        let deltas = compare(
            &timelines(&snapshots, &["Equifax"]),
            SynthesisOptions {
                include_percent_change: true,
            },
        );
        let trend = find(
            &deltas,
            &DeltaScope::Trend {
                bureau: Bureau::new("Equifax"),
            },
            Metric::DelinquencyCount,
        );

        assert_eq!(trend.change, MetricValue::Number(2.0));
        assert_eq!(
            trend.percent_change,
            Some(MetricValue::Unavailable(UnavailableReason::ZeroDenominator))
        );
    }

    #[test]
    fn test_delinquency_count_sums_count_parameters_only() {
        let snap = snapshot(
            "Equifax",
            "2024-01-01",
            None,
            vec![
                parameter("Accounts 30 days past due", Category::Delinquency, MetricValue::Number(2.0)),
                parameter("Accounts 60 days past due", Category::Delinquency, MetricValue::Number(1.0)),
                parameter(
                    "Months since most recent delinquency",
                    Category::Delinquency,
                    MetricValue::Number(14.0),
                ),
                parameter("Past due amount", Category::Delinquency, MetricValue::Number(350.0)),
            ],
        );

        assert_eq!(metric_value(&snap, Metric::DelinquencyCount), MetricValue::Number(3.0));
    }

    #[test]
    fn test_delinquency_count_unavailable_component() {
        let snap = snapshot(
            "Equifax",
            "2024-01-01",
            None,
            vec![
                parameter("Accounts 30 days past due", Category::Delinquency, MetricValue::Number(2.0)),
                parameter(
                    "Accounts 90 days past due",
                    Category::Delinquency,
                    MetricValue::Unavailable(UnavailableReason::Sentinel),
                ),
            ],
        );

        assert_eq!(
            metric_value(&snap, Metric::DelinquencyCount),
            MetricValue::Unavailable(UnavailableReason::Sentinel)
        );
    }

    #[test]
    fn test_delta_ordering_is_deterministic() {
        let snapshots = vec![
            snapshot("TransUnion", "2024-01-01", Some(640.0), vec![]),
            snapshot("Equifax", "2024-01-01", Some(620.0), vec![]),
            snapshot("Experian", "2024-01-01", Some(610.0), vec![]),
        ];

        let deltas = compare(
            &timelines(&snapshots, &["TransUnion", "Experian", "Equifax"]),
            SynthesisOptions::default(),
        );

        // 3 bureaus × 3 metrics trends + 3 pairs × 3 metrics
        assert_eq!(deltas.len(), 18);
        assert_eq!(
            deltas[9].scope,
            DeltaScope::CrossBureau {
                subject: Bureau::new("Equifax"),
                baseline: Bureau::new("Experian"),
            }
        );
        assert_eq!(deltas[9].change, MetricValue::Number(10.0));
    }

    #[test]
    fn test_absent_baseline_with_missing_metric_is_no_data() {
        let snapshots = vec![snapshot("Experian", "2024-01-01", Some(640.0), vec![])];
        let options = SynthesisOptions {
            include_percent_change: true,
        };

        let deltas = compare(&timelines(&snapshots, &["Experian", "TransUnion"]), options);
        let scope = DeltaScope::CrossBureau {
            subject: Bureau::new("Experian"),
            baseline: Bureau::new("TransUnion"),
        };

        for metric in [Metric::Utilization, Metric::DelinquencyCount] {
            let cross = find(&deltas, &scope, metric);
            assert_eq!(cross.subject, MetricValue::Unavailable(UnavailableReason::Missing));
            assert_eq!(cross.baseline, MetricValue::Unavailable(UnavailableReason::NoData));
            assert_eq!(cross.change, MetricValue::Unavailable(UnavailableReason::NoData), "{:?}", metric);
            assert_eq!(
                cross.percent_change,
                Some(MetricValue::Unavailable(UnavailableReason::NoData))
            );
        }

        let score = find(&deltas, &scope, Metric::Score);
        assert_eq!(score.subject, MetricValue::Number(640.0));
        assert_eq!(score.change, MetricValue::Unavailable(UnavailableReason::NoData));
    }

    #[test]
    fn test_no_data_outranks_other_reasons() {
        let no_data = MetricValue::Unavailable(UnavailableReason::NoData);
        let sentinel = MetricValue::Unavailable(UnavailableReason::Sentinel);

        assert_eq!(difference(sentinel, no_data), no_data);
        assert_eq!(difference(no_data, sentinel), no_data);
        assert_eq!(difference(sentinel, MetricValue::Number(1.0)), sentinel);
        assert_eq!(
            difference(
                MetricValue::Unavailable(UnavailableReason::Missing),
                sentinel
            ),
            MetricValue::Unavailable(UnavailableReason::Missing)
        );
    }

    #[test]
    fn test_overflow_is_unavailable_not_infinite() {
        assert_eq!(
            difference(MetricValue::Number(f64::MAX), MetricValue::Number(-f64::MAX)),
            MetricValue::Unavailable(UnavailableReason::Unparseable)
        );
        assert_eq!(
            difference(MetricValue::Number(1e305), MetricValue::Number(0.0)),
            MetricValue::Number(1e305)
        );
        assert_eq!(
            percent_change(MetricValue::Number(1.0), MetricValue::Number(1e-320)),
            MetricValue::Unavailable(UnavailableReason::ZeroDenominator)
        );
    }

    #[test]
    fn test_score_prefers_report_bureau_entry() {
        let mut equifax = snapshot("Equifax", "2024-01-01", None, vec![]);
        let entry = |bureau: &str, value: f64| ScoreEntry {
            value: MetricValue::Number(value),
            raw_value: value.to_string(),
            model: None,
            bureau: Bureau::new(bureau),
            own_date: None,
            effective_date: Some(day("2024-01-01")),
        };

        equifax.scores = vec![entry("TransUnion", 690.0)];
        assert_eq!(
            metric_value(&equifax, Metric::Score),
            MetricValue::Unavailable(UnavailableReason::Missing)
        );

        equifax.scores.push(entry("Equifax", 700.0));
        assert_eq!(metric_value(&equifax, Metric::Score), MetricValue::Number(700.0));
    }
}
