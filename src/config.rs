// ⚙️ Engine Configuration - defaults → bureau-lens.toml → BUREAU_LENS_* env → CLI
//
// The engine itself never reads files or the environment; everything it needs
// arrives through EngineConfig (or Engine::new).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bureau::Bureau;

const DEFAULT_FILE_NAME: &str = "bureau-lens.toml";

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub categories: CategoriesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    /// Bureaus every entity is expected to have; absent ones are reported
    pub expected_bureaus: Vec<Bureau>,
    pub include_percent_change: bool,
    /// Confidence below this sets needs_review
    pub review_threshold: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoriesConfig {
    /// JSON keyword rules replacing the built-in table
    pub rules_path: Option<PathBuf>,
    /// CSV exact-name catalog (name,category)
    pub catalog_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub expected_bureaus: Option<Vec<String>>,
    pub include_percent_change: Option<bool>,
    pub review_threshold: Option<f64>,
    pub rules_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig {
                expected_bureaus: vec![
                    Bureau::new("Equifax"),
                    Bureau::new("Experian"),
                    Bureau::new("TransUnion"),
                ],
                include_percent_change: false,
                review_threshold: 0.7,
            },
            categories: CategoriesConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl EngineConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let maybe_path = resolve_config_path(options.config_path.as_deref());
        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(analysis) = patch.analysis {
            if let Some(expected_bureaus) = analysis.expected_bureaus {
                self.analysis.expected_bureaus = to_bureaus(expected_bureaus);
            }
            if let Some(include_percent_change) = analysis.include_percent_change {
                self.analysis.include_percent_change = include_percent_change;
            }
            if let Some(review_threshold) = analysis.review_threshold {
                self.analysis.review_threshold = review_threshold;
            }
        }

        if let Some(categories) = patch.categories {
            if let Some(rules_path) = categories.rules_path {
                self.categories.rules_path = Some(rules_path);
            }
            if let Some(catalog_path) = categories.catalog_path {
                self.categories.catalog_path = Some(catalog_path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BUREAU_LENS_EXPECTED_BUREAUS") {
            self.analysis.expected_bureaus =
                to_bureaus(value.split(',').map(str::to_string).collect());
        }
        if let Some(value) = read_env("BUREAU_LENS_INCLUDE_PERCENT_CHANGE") {
            self.analysis.include_percent_change =
                parse_bool("BUREAU_LENS_INCLUDE_PERCENT_CHANGE", &value)?;
        }
        if let Some(value) = read_env("BUREAU_LENS_REVIEW_THRESHOLD") {
            self.analysis.review_threshold = parse_f64("BUREAU_LENS_REVIEW_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("BUREAU_LENS_CATEGORY_RULES") {
            self.categories.rules_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("BUREAU_LENS_FIELD_CATALOG") {
            self.categories.catalog_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("BUREAU_LENS_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("BUREAU_LENS_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(expected_bureaus) = overrides.expected_bureaus {
            self.analysis.expected_bureaus = to_bureaus(expected_bureaus);
        }
        if let Some(include_percent_change) = overrides.include_percent_change {
            self.analysis.include_percent_change = include_percent_change;
        }
        if let Some(review_threshold) = overrides.review_threshold {
            self.analysis.review_threshold = review_threshold;
        }
        if let Some(rules_path) = overrides.rules_path {
            self.categories.rules_path = Some(rules_path);
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.categories.catalog_path = Some(catalog_path);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_analysis(&self.analysis)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Trimmed, blank entries dropped, first occurrence kept
fn to_bureaus(names: Vec<String>) -> Vec<Bureau> {
    let mut bureaus: Vec<Bureau> = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let bureau = Bureau::new(name);
        if !bureaus.contains(&bureau) {
            bureaus.push(bureau);
        }
    }
    bureaus
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_FILE_NAME), PathBuf::from("config").join(DEFAULT_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env_vars(&raw)?;

    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expand `${VAR}` from the environment
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&analysis.review_threshold) {
        return Err(ConfigError::Validation(
            "analysis.review_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    analysis: Option<AnalysisPatch>,
    categories: Option<CategoriesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    expected_bureaus: Option<Vec<String>>,
    include_percent_change: Option<bool>,
    review_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoriesPatch {
    rules_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
