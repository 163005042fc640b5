// 🏷️ Summary Parameter Categorizer - Keyword rules as data
//
// The production parameter catalog has well over 100 names and changes
// independently of code, so matching lives in a table, not in conditionals.
// The table is immutable once built and injected into the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::TableError;
use crate::model::{CategorizedParameter, CreditReport, Snapshot};

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Utilization,
    Inquiries,
    Delinquency,
    Accounts,
    Obligations,
    Balances,
    CreditLimits,
    CreditAge,
    Derogatory,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Utilization,
        Category::Inquiries,
        Category::Delinquency,
        Category::Accounts,
        Category::Obligations,
        Category::Balances,
        Category::CreditLimits,
        Category::CreditAge,
        Category::Derogatory,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Utilization => "UTILIZATION",
            Category::Inquiries => "INQUIRIES",
            Category::Delinquency => "DELINQUENCY",
            Category::Accounts => "ACCOUNTS",
            Category::Obligations => "OBLIGATIONS",
            Category::Balances => "BALANCES",
            Category::CreditLimits => "CREDIT_LIMITS",
            Category::CreditAge => "CREDIT_AGE",
            Category::Derogatory => "DEROGATORY",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; spaces and dashes count as underscores
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_uppercase().replace([' ', '-'], "_");
        Category::ALL
            .iter()
            .find(|c| c.as_str() == key)
            .copied()
            .ok_or_else(|| value.to_string())
    }
}

// ============================================================================
// KEYWORD RULE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Rule ID for tracking
    pub id: String,

    pub category: Category,

    /// Every keyword must occur (case-insensitive substring)
    pub keywords: Vec<String>,

    /// Priority (higher = applied first)
    #[serde(default)]
    pub priority: i32,
}

impl KeywordRule {
    pub fn new(id: &str, category: Category, keywords: &[&str], priority: i32) -> Self {
        KeywordRule {
            id: id.to_string(),
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            priority,
        }
    }

    /// `name_lower` must already be lowercased
    fn matches(&self, name_lower: &str) -> bool {
        !self.keywords.is_empty() && self.keywords.iter().all(|k| name_lower.contains(k.as_str()))
    }
}

/// Built-in rules: (id, category, keywords, priority)
const STANDARD_RULES: &[(&str, Category, &[&str], i32)] = &[
    ("utilization", Category::Utilization, &["utiliz"], 100),
    ("utilisation", Category::Utilization, &["utilis"], 100),
    ("balance-to-limit", Category::Utilization, &["balance", "limit"], 98),
    ("delinquency", Category::Delinquency, &["delinq"], 95),
    ("inquiries", Category::Inquiries, &["inquir"], 90),
    ("enquiries", Category::Inquiries, &["enquir"], 90),
    ("collections", Category::Derogatory, &["collection"], 88),
    ("public-records", Category::Derogatory, &["public record"], 88),
    ("bankruptcy", Category::Derogatory, &["bankrupt"], 88),
    ("charge-off", Category::Derogatory, &["charge-off"], 88),
    ("charged-off", Category::Derogatory, &["charged off"], 88),
    ("chargeoff", Category::Derogatory, &["chargeoff"], 88),
    ("derogatory", Category::Derogatory, &["derog"], 88),
    ("past-due", Category::Delinquency, &["past due"], 85),
    ("days-late", Category::Delinquency, &["days late"], 85),
    ("late-payment", Category::Delinquency, &["late payment"], 85),
    ("scheduled-payment", Category::Obligations, &["scheduled", "payment"], 80),
    ("monthly-payment", Category::Obligations, &["monthly", "payment"], 75),
    ("debt-to-income", Category::Obligations, &["debt", "income"], 75),
    ("credit-limit", Category::CreditLimits, &["limit"], 70),
    ("high-credit", Category::CreditLimits, &["high credit"], 70),
    ("oldest-account", Category::CreditAge, &["oldest"], 68),
    ("newest-account", Category::CreditAge, &["newest"], 68),
    ("average-age", Category::CreditAge, &["average age"], 68),
    ("age-of", Category::CreditAge, &["age of"], 68),
    ("credit-history-length", Category::CreditAge, &["length of credit"], 68),
    ("tradelines", Category::Accounts, &["tradeline"], 65),
    ("trade-lines", Category::Accounts, &["trade line"], 65),
    ("balance", Category::Balances, &["balance"], 55),
    ("amount-owed", Category::Balances, &["amount owed"], 55),
    ("outstanding", Category::Balances, &["outstanding"], 55),
    ("accounts", Category::Accounts, &["account"], 45),
];

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub matched_by: Option<String>,
}

impl Classification {
    fn other() -> Self {
        Classification {
            category: Category::Other,
            matched_by: None,
        }
    }
}

// ============================================================================
// CATEGORY TABLE
// ============================================================================

/// Catalog row as exported from the production field catalog
#[derive(Debug, Deserialize)]
struct CatalogRow {
    name: String,
    category: String,
}

/// Immutable keyword table plus optional exact-name catalog
#[derive(Debug, Clone)]
pub struct CategoryTable {
    rules: Vec<KeywordRule>,
    catalog: BTreeMap<String, Category>,
}

impl CategoryTable {
    /// The built-in table
    pub fn standard() -> Self {
        let rules = STANDARD_RULES
            .iter()
            .map(|(id, category, keywords, priority)| {
                KeywordRule::new(id, *category, keywords, *priority)
            })
            .collect();

        CategoryTable::from_rules(rules)
    }

    /// Create table from a list of rules
    pub fn from_rules(mut rules: Vec<KeywordRule>) -> Self {
        for rule in &mut rules {
            rule.keywords = rule.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
        // Stable: equal priorities keep table order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        CategoryTable {
            rules,
            catalog: BTreeMap::new(),
        }
    }

    /// Load keyword rules from a JSON array
    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let rules: Vec<KeywordRule> = serde_json::from_str(json)?;

        if let Some(empty) = rules.iter().find(|r| r.keywords.iter().all(|k| k.trim().is_empty())) {
            return Err(TableError::EmptyRule(empty.id.clone()));
        }

        Ok(CategoryTable::from_rules(rules))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| TableError::ReadFile {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        CategoryTable::from_json_str(&content)
    }

    /// Add an exact-name catalog (CSV with `name,category` headers).
    ///
    /// Catalog hits take precedence over keyword rules.
    pub fn with_catalog_csv<R: Read>(mut self, reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        for (index, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
            let row = row?;
            let category = row
                .category
                .parse::<Category>()
                .map_err(|value| TableError::UnknownCategory {
                    value,
                    row: index + 2, // 1-indexed + header row
                })?;
            self.catalog.insert(fold_name(&row.name), category);
        }

        Ok(self)
    }

    pub fn with_catalog_file<P: AsRef<Path>>(self, path: P) -> Result<Self, TableError> {
        let file = fs::File::open(path.as_ref()).map_err(|source| TableError::ReadFile {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        self.with_catalog_csv(file)
    }

    /// Classify a parameter name. Total: unknown input is `Other`.
    pub fn classify(&self, name: &str) -> Classification {
        let folded = fold_name(name);
        if folded.is_empty() {
            return Classification::other();
        }

        if let Some(category) = self.catalog.get(&folded) {
            return Classification {
                category: *category,
                matched_by: Some("catalog".to_string()),
            };
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(&folded))
            .map(|rule| Classification {
                category: rule.category,
                matched_by: Some(rule.id.clone()),
            })
            .unwrap_or_else(Classification::other)
    }

    pub fn categorize(&self, name: &str) -> Category {
        self.classify(name).category
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Categorize against the built-in table
pub fn categorize(name: &str) -> Category {
    static STANDARD: OnceLock<CategoryTable> = OnceLock::new();
    STANDARD.get_or_init(CategoryTable::standard).categorize(name)
}

/// Attach categories to every parameter of every report
pub fn categorize_reports(reports: Vec<CreditReport>, table: &CategoryTable) -> Vec<Snapshot> {
    reports
        .into_iter()
        .map(|report| {
            let parameters = report
                .parameters
                .into_iter()
                .map(|parameter| {
                    let classification = table.classify(&parameter.name);
                    CategorizedParameter {
                        parameter,
                        category: classification.category,
                        matched_by: classification.matched_by,
                    }
                })
                .collect();

            Snapshot {
                record_id: report.record_id,
                sequence: report.sequence,
                bureau: report.bureau,
                issued_date: report.issued_date,
                undated: report.undated,
                scores: report.scores,
                parameters,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
