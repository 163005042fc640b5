// 🏛️ Bureau Identity - Canonical names + alias normalization
//
// "EXP", "Experian PLC", "experian" → all the same bureau.
// Timelines are keyed by the canonical name so aliases never split history.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// BUREAU
// ============================================================================

/// Canonical bureau name.
///
/// A plain string newtype so it serializes as a JSON map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bureau(String);

impl Bureau {
    pub fn new(name: impl Into<String>) -> Self {
        Bureau(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bureau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Bureau {
    fn from(name: &str) -> Self {
        Bureau::new(name)
    }
}

// ============================================================================
// BUREAU PROFILE
// ============================================================================

/// A known bureau with the aliases upstream payloads use for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BureauProfile {
    /// Canonical name (the one timelines are keyed by)
    pub canonical_name: String,

    /// Alternative spellings, codes, and legal names
    pub aliases: Vec<String>,
}

impl BureauProfile {
    pub fn new(canonical_name: &str, aliases: &[&str]) -> Self {
        BureauProfile {
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Exact (case-insensitive, whitespace-collapsed) match against name or alias
    pub fn matches(&self, raw: &str) -> bool {
        let key = fold(raw);
        if key.is_empty() {
            return false;
        }

        fold(&self.canonical_name) == key || self.aliases.iter().any(|alias| fold(alias) == key)
    }
}

// ============================================================================
// BUREAU REGISTRY
// ============================================================================

/// Normalization outcome for a raw bureau string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Matched a registered bureau
    Known(Bureau),
    /// Not registered; kept as the trimmed original
    Unrecognized(Bureau),
}

impl Normalized {
    pub fn bureau(&self) -> &Bureau {
        match self {
            Normalized::Known(b) | Normalized::Unrecognized(b) => b,
        }
    }

    pub fn into_bureau(self) -> Bureau {
        match self {
            Normalized::Known(b) | Normalized::Unrecognized(b) => b,
        }
    }
}

/// Registry of known bureaus.
///
/// Read-only once built; the engine shares one across invocations.
#[derive(Debug, Clone)]
pub struct BureauRegistry {
    profiles: Vec<BureauProfile>,
}

impl BureauRegistry {
    /// Registry with the three major US bureaus
    pub fn new() -> Self {
        BureauRegistry {
            profiles: vec![
                BureauProfile::new(
                    "Equifax",
                    &["EFX", "EQ", "EQF", "Equifax Inc", "Equifax Information Services"],
                ),
                BureauProfile::new(
                    "Experian",
                    &["EXP", "EX", "XPN", "Experian PLC", "Experian Information Solutions"],
                ),
                BureauProfile::new(
                    "TransUnion",
                    &["TU", "TUC", "Trans Union", "TransUnion LLC", "Trans-Union"],
                ),
            ],
        }
    }

    pub fn from_profiles(profiles: Vec<BureauProfile>) -> Self {
        BureauRegistry { profiles }
    }

    /// Normalize a raw bureau string. Returns None for blank input.
    pub fn normalize(&self, raw: &str) -> Option<Normalized> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let known = self
            .profiles
            .iter()
            .find(|profile| profile.matches(trimmed))
            .map(|profile| Normalized::Known(Bureau::new(profile.canonical_name.clone())));

        Some(known.unwrap_or_else(|| Normalized::Unrecognized(Bureau::new(trimmed))))
    }

    /// Canonical bureaus in registration order
    pub fn known_bureaus(&self) -> Vec<Bureau> {
        self.profiles
            .iter()
            .map(|p| Bureau::new(p.canonical_name.clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.profiles.len()
    }
}

impl Default for BureauRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn fold(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================
