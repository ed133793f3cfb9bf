//! Layered configuration: `pythia.toml` file, struct defaults, and
//! environment overrides for the oracle endpoint.
//!
//! ```toml
//! [dispatch]
//! filter_enabled = true
//! packages = ["com.example.*", "Node"]
//!
//! [heap]
//! max_depth = 10
//! max_objects = 100
//!
//! [source]
//! context_lines = 2
//!
//! [oracle]
//! url = "http://127.0.0.1:8000/solve"
//! timeout_secs = 60
//! ```
//!
//! `SERVICE_URL` and `TIMEOUT_SECONDS` override the `[oracle]` table at
//! client construction time.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Field names never worth showing the oracle. Policy, not contract.
const DEFAULT_IRRELEVANT_FIELDS: &[&str] = &[
    "modCount",
    "size",
    "capacity",
    "hash",
    "threshold",
    "loadFactor",
    "EMPTY_ELEMENTDATA",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub heap: HeapConfig,
    pub source: SourceConfig,
    pub oracle: OracleConfig,
}

/// Polymorphic-dispatch instrumentation filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// When true, only declared types matching one of `packages` are
    /// instrumented.
    pub filter_enabled: bool,
    /// Patterns: `*` (everything), an exact class name, or `pkg.*`.
    pub packages: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            filter_enabled: false,
            packages: vec!["*".to_string()],
        }
    }
}

impl DispatchConfig {
    /// Does `class_name` pass the inclusion filter? Always true when the
    /// filter is disabled.
    pub fn matches(&self, class_name: &str) -> bool {
        if !self.filter_enabled {
            return true;
        }
        self.packages.iter().any(|pattern| {
            if pattern == "*" {
                true
            } else if let Some(prefix) = pattern.strip_suffix(".*") {
                class_name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
            } else {
                pattern == class_name
            }
        })
    }
}

/// Heap-reachability collector limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    pub max_depth: usize,
    pub max_objects: usize,
    pub irrelevant_fields: Vec<String>,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            max_depth: 10,
            max_objects: 100,
            irrelevant_fields: DEFAULT_IRRELEVANT_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl HeapConfig {
    pub fn irrelevant_set(&self) -> HashSet<&str> {
        self.irrelevant_fields.iter().map(String::as_str).collect()
    }
}

/// Source-context collector settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Lines of context around the method body.
    pub context_lines: usize,
    /// Prefix each emitted line with its number.
    pub number_lines: bool,
    /// Attach the whole class source as well.
    pub include_full_class: bool,
    pub max_method_source_length: usize,
    pub max_class_source_length: usize,
    pub max_related_class_length: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            context_lines: 2,
            number_lines: true,
            include_full_class: false,
            max_method_source_length: 4000,
            max_class_source_length: 8000,
            max_related_class_length: 4000,
        }
    }
}

/// Oracle endpoint settings; overridden by `SERVICE_URL` and
/// `TIMEOUT_SECONDS`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            url: "http://127.0.0.1:8000/solve".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "malformed config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Parse a `pythia.toml` file. Missing tables fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }

    /// Parse TOML text directly.
    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }
}
