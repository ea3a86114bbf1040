//! Configuration for the transactional index overlay.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TXINDEX_` and use double
//! underscores to separate nested levels:
//! - `TXINDEX_INDEX__IN_MEMORY=true` sets `index.in_memory`
//! - `TXINDEX_TRANSACTION__APPLY_MODE=single_commit` sets `transaction.apply_mode`
//! - `TXINDEX_WRITER__THREADS=2` sets `writer.threads`

use crate::engine::WriterTuning;
use crate::transaction::{ApplyMode, DeleteResolution, IsolationLevel};
use crate::types::{Analyzer, DEFAULT_ID_FIELD};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".txindex";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "TXINDEX_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Index location and schema
    #[serde(default)]
    pub index: IndexConfig,

    /// Write channel settings
    #[serde(default)]
    pub writer: WriterConfig,

    /// Transaction overlay behavior
    #[serde(default)]
    pub transaction: TransactionConfig,

    /// Log filtering
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the Tantivy index
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Keep the index in RAM instead of `path`
    #[serde(default = "default_false")]
    pub in_memory: bool,

    /// Field carrying document identities
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Text fields of the schema
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FieldConfig {
    pub name: String,

    /// Registered tokenizer used to index this field
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Stored fields can be read back, which compensation relies on
    #[serde(default = "default_true")]
    pub stored: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WriterConfig {
    /// Overall indexing memory budget per write channel
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: usize,

    /// Indexing threads per write channel
    #[serde(default = "default_writer_threads")]
    pub threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransactionConfig {
    /// How staged operations are replayed at commit
    #[serde(default)]
    pub apply_mode: ApplyMode,

    /// What a staged delete removes at commit
    #[serde(default)]
    pub delete_resolution: DeleteResolution,

    /// Analyzer for staged adds that do not name one. When unset each field
    /// is indexed with its own tokenizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_analyzer: Option<String>,

    /// Isolation used when a definition does not name one
    #[serde(default)]
    pub default_isolation: IsolationLevel,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `"txindex::transaction" = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".txindex/index")
}
fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}
fn default_tokenizer() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_memory_budget() -> usize {
    50_000_000
}
fn default_writer_threads() -> usize {
    1
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_fields() -> Vec<FieldConfig> {
    vec![FieldConfig::text("title"), FieldConfig::text("body")]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index: IndexConfig::default(),
            writer: WriterConfig::default(),
            transaction: TransactionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            in_memory: false,
            id_field: default_id_field(),
            fields: default_fields(),
        }
    }
}

impl IndexConfig {
    /// RAM-backed index with the given text fields
    pub fn in_memory(fields: Vec<FieldConfig>) -> Self {
        Self {
            in_memory: true,
            fields,
            ..Self::default()
        }
    }

    /// On-disk index at `path` with the given text fields
    pub fn at(path: impl Into<PathBuf>, fields: Vec<FieldConfig>) -> Self {
        Self {
            path: path.into(),
            fields,
            ..Self::default()
        }
    }
}

impl FieldConfig {
    /// Stored field indexed with the default tokenizer
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokenizer: default_tokenizer(),
            stored: true,
        }
    }

    /// Stored field indexed as a single untokenized term
    pub fn keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokenizer: "raw".to_string(),
            stored: true,
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: default_memory_budget(),
            threads: default_writer_threads(),
        }
    }
}

impl WriterConfig {
    pub fn tuning(&self) -> WriterTuning {
        WriterTuning {
            memory_budget: self.memory_budget_bytes,
            threads: self.threads,
            ..WriterTuning::default()
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            apply_mode: ApplyMode::default(),
            delete_resolution: DeleteResolution::default(),
            default_analyzer: None,
            default_isolation: IsolationLevel::default(),
        }
    }
}

impl TransactionConfig {
    pub fn default_analyzer(&self) -> Option<Analyzer> {
        self.default_analyzer.as_deref().map(Analyzer::new)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Render as an `EnvFilter` directive string
    pub fn directives(&self) -> String {
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();

        std::iter::once(self.default.clone())
            .chain(
                modules
                    .into_iter()
                    .map(|(module, level)| format!("{module}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref().to_path_buf())
            .extract()
            .map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore (__) separates nested levels, single underscores stay
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find `.txindex/settings.toml` from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
