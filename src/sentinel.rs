// 🚫 Sentinel Values - Tagged numbers that are never silently zero
//
// Bureau payloads embed reserved codes (-3, -4, -5, "N/A") in numeric
// fields. They mean "suppressed / not applicable", so they are tagged at
// extraction time and never reach arithmetic as numbers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric codes reserved by bureaus for unavailable data
pub const SENTINEL_CODES: [f64; 3] = [-3.0, -4.0, -5.0];

/// Textual sentinel (compared case-insensitively after trimming)
pub const SENTINEL_TEXT: &str = "N/A";

// ============================================================================
// UNAVAILABLE REASON
// ============================================================================

/// Why a value is not a number.
///
/// The three numeric sentinel codes share one `Sentinel` reason until their
/// individual semantics are pinned down; the raw text is kept next to every
/// extracted value so they can be split later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Bureau reported a sentinel code
    Sentinel,
    /// Field absent or null
    Missing,
    /// Present but not a finite number
    Unparseable,
    /// Bureau has no dated snapshots at all
    NoData,
    /// Trend needs at least two snapshots
    InsufficientHistory,
    /// Percent change against a zero base
    ZeroDenominator,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::Sentinel => "sentinel",
            UnavailableReason::Missing => "missing",
            UnavailableReason::Unparseable => "unparseable",
            UnavailableReason::NoData => "no_data",
            UnavailableReason::InsufficientHistory => "insufficient_history",
            UnavailableReason::ZeroDenominator => "zero_denominator",
        }
    }
}

// ============================================================================
// METRIC VALUE
// ============================================================================

/// A number, or an explicit marker that there is no number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Number(f64),
    Unavailable(UnavailableReason),
}

impl MetricValue {
    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Number(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            MetricValue::Number(_) => None,
            MetricValue::Unavailable(reason) => Some(*reason),
        }
    }

    /// Classify an already-deserialized JSON value.
    ///
    /// Returns the tagged value plus its raw textual form for audit.
    pub fn from_json(value: Option<&Value>) -> (MetricValue, String) {
        match value {
            None | Some(Value::Null) => (
                MetricValue::Unavailable(UnavailableReason::Missing),
                String::new(),
            ),
            Some(Value::Number(n)) => {
                let raw = n.to_string();
                match n.as_f64() {
                    Some(f) => (classify_number(f), raw),
                    None => (MetricValue::Unavailable(UnavailableReason::Unparseable), raw),
                }
            }
            Some(Value::String(s)) => (MetricValue::parse_text(s), s.clone()),
            Some(other) => (
                MetricValue::Unavailable(UnavailableReason::Unparseable),
                other.to_string(),
            ),
        }
    }

    /// Parse a textual value, detecting sentinels before any numeric parse.
    ///
    /// Accepts thousands separators and a trailing percent sign.
    pub fn parse_text(text: &str) -> MetricValue {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return MetricValue::Unavailable(UnavailableReason::Missing);
        }

        if trimmed.eq_ignore_ascii_case(SENTINEL_TEXT) {
            return MetricValue::Unavailable(UnavailableReason::Sentinel);
        }

        let cleaned: String = trimmed
            .trim_end_matches('%')
            .trim()
            .chars()
            .filter(|c| *c != ',')
            .collect();

        match cleaned.parse::<f64>() {
            Ok(n) => classify_number(n),
            Err(_) => MetricValue::Unavailable(UnavailableReason::Unparseable),
        }
    }
}

fn classify_number(n: f64) -> MetricValue {
    if !n.is_finite() {
        return MetricValue::Unavailable(UnavailableReason::Unparseable);
    }

    if SENTINEL_CODES.iter().any(|code| *code == n) {
        return MetricValue::Unavailable(UnavailableReason::Sentinel);
    }

    MetricValue::Number(n)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_sentinels_are_unavailable() {
        for code in [-3, -4, -5] {
            let value = json!(code);
            let (parsed, raw) = MetricValue::from_json(Some(&value));
            assert_eq!(parsed, MetricValue::Unavailable(UnavailableReason::Sentinel));
            assert_eq!(raw, code.to_string());
        }

        let float_code = json!(-4.0);
        let (parsed, _) = MetricValue::from_json(Some(&float_code));
        assert_eq!(parsed, MetricValue::Unavailable(UnavailableReason::Sentinel));
    }

    #[test]
    fn test_textual_sentinels_are_unavailable() {
        for text in ["-3", "-4", " -5 ", "N/A", "n/a", "-4.0", "-4%"] {
            assert_eq!(
                MetricValue::parse_text(text),
                MetricValue::Unavailable(UnavailableReason::Sentinel),
                "{text} should be a sentinel"
            );
        }
    }

    #[test]
    fn test_real_numbers_parse() {
        assert_eq!(MetricValue::parse_text("45"), MetricValue::Number(45.0));
        assert_eq!(MetricValue::parse_text("37.5%"), MetricValue::Number(37.5));
        assert_eq!(MetricValue::parse_text("1,250"), MetricValue::Number(1250.0));
        assert_eq!(MetricValue::parse_text("-2"), MetricValue::Number(-2.0));
        assert_eq!(MetricValue::parse_text("0"), MetricValue::Number(0.0));
    }

    #[test]
    fn test_missing_and_garbage() {
        assert_eq!(
            MetricValue::from_json(None).0,
            MetricValue::Unavailable(UnavailableReason::Missing)
        );
        assert_eq!(
            MetricValue::from_json(Some(&Value::Null)).0,
            MetricValue::Unavailable(UnavailableReason::Missing)
        );
        assert_eq!(
            MetricValue::parse_text("lots"),
            MetricValue::Unavailable(UnavailableReason::Unparseable)
        );
        assert_eq!(
            MetricValue::parse_text("NaN"),
            MetricValue::Unavailable(UnavailableReason::Unparseable)
        );
        assert_eq!(
            MetricValue::from_json(Some(&json!({"nested": 1}))).0,
            MetricValue::Unavailable(UnavailableReason::Unparseable)
        );
    }

    #[test]
    fn test_serialized_shape_distinguishes_unavailable() {
        let available = serde_json::to_value(MetricValue::Number(0.0)).unwrap();
        let suppressed =
            serde_json::to_value(MetricValue::Unavailable(UnavailableReason::Sentinel)).unwrap();

        assert_eq!(available, json!({"kind": "number", "value": 0.0}));
        assert_eq!(suppressed, json!({"kind": "unavailable", "value": "sentinel"}));
    }
}
