//! Configuration types for ferry-connect
//!
//! Two ways in:
//!   Host settings map → `FileSourceConfig::from_settings` (typed by the definition)
//!   YAML file → `ConnectConfig::from_file` (storage + source + runner sections)

use crate::definition::{Definition, SettingDef, SettingType};
use crate::error::{ConnectError, ConnectorError, ConnectorResult, Result};
use crate::partitioner::TaskPartitioner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use validator::Validate;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Class name reported in the connector definition
pub const FILE_SOURCE_CLASS: &str = "ferry_connect::FileSourceTask";

/// Setting keys
pub mod keys {
    pub const TOPIC: &str = "topic";
    pub const INPUT_FOLDER: &str = "input_folder";
    pub const COMPLETED_FOLDER: &str = "completed_folder";
    pub const ERROR_FOLDER: &str = "error_folder";
    pub const TASK_TOTAL: &str = "task_total";
    pub const TASK_HASH: &str = "task_hash";
    pub const FILE_CACHE_SIZE: &str = "file_cache_size";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const CSV_DELIMITER: &str = "csv_delimiter";
}

/// Resolved settings of one file source task
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate, JsonSchema)]
pub struct FileSourceConfig {
    /// Destination topic
    #[validate(length(min = 1, max = 249))]
    pub topic: String,

    /// Folder scanned for new files
    #[validate(length(min = 1))]
    pub input_folder: String,

    /// Folder receiving fully delivered files; they are deleted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_folder: Option<String>,

    /// Folder receiving files with malformed content
    #[validate(length(min = 1))]
    pub error_folder: String,

    /// Number of cooperating task instances
    #[validate(range(min = 1))]
    pub task_total: u32,

    /// Ordinal of this task (taken modulo `task_total`)
    pub task_hash: u32,

    /// Capacity of the file queue
    #[serde(default = "default_file_cache_size")]
    #[validate(range(min = 1))]
    pub file_cache_size: usize,

    /// Maximum records returned by one poll
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// CSV field delimiter
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

fn default_file_cache_size() -> usize {
    1000
}

fn default_batch_size() -> usize {
    1000
}

fn default_csv_delimiter() -> char {
    ','
}

fn is_valid_delimiter(delimiter: char) -> bool {
    delimiter.is_ascii() && !matches!(delimiter, '"' | '\n' | '\r')
}

impl FileSourceConfig {
    /// Create a config with every optional setting at its default
    pub fn new(
        topic: impl Into<String>,
        input_folder: impl Into<String>,
        error_folder: impl Into<String>,
        task_total: u32,
        task_hash: u32,
    ) -> Self {
        Self {
            topic: topic.into(),
            input_folder: input_folder.into(),
            completed_folder: None,
            error_folder: error_folder.into(),
            task_total,
            task_hash,
            file_cache_size: default_file_cache_size(),
            batch_size: default_batch_size(),
            csv_delimiter: default_csv_delimiter(),
        }
    }

    /// Move completed files to `folder` instead of deleting them
    pub fn with_completed_folder(mut self, folder: impl Into<String>) -> Self {
        self.completed_folder = Some(folder.into());
        self
    }

    /// Set the file queue capacity
    pub fn with_file_cache_size(mut self, size: usize) -> Self {
        self.file_cache_size = size;
        self
    }

    /// Set the per-poll record limit
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the CSV delimiter
    pub fn with_csv_delimiter(mut self, delimiter: char) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    /// Settings recognized by the file source
    pub fn definition() -> Definition {
        Definition::of(
            FILE_SOURCE_CLASS,
            vec![
                SettingDef::builder(keys::TOPIC, SettingType::String)
                    .required()
                    .documentation("Topic that rows are written to")
                    .build(),
                SettingDef::builder(keys::INPUT_FOLDER, SettingType::String)
                    .required()
                    .documentation("Folder scanned for new files")
                    .build(),
                SettingDef::builder(keys::COMPLETED_FOLDER, SettingType::String)
                    .documentation("Folder for fully delivered files; deleted when unset")
                    .build(),
                SettingDef::builder(keys::ERROR_FOLDER, SettingType::String)
                    .required()
                    .documentation("Folder for files that could not be parsed")
                    .build(),
                SettingDef::builder(keys::TASK_TOTAL, SettingType::PositiveInt)
                    .required()
                    .documentation("Number of cooperating tasks")
                    .build(),
                SettingDef::builder(keys::TASK_HASH, SettingType::NonNegativeInt)
                    .required()
                    .documentation("Ordinal of this task")
                    .build(),
                SettingDef::builder(keys::FILE_CACHE_SIZE, SettingType::PositiveInt)
                    .default_value(default_file_cache_size().to_string())
                    .documentation("Maximum number of queued file paths")
                    .build(),
                SettingDef::builder(keys::BATCH_SIZE, SettingType::PositiveInt)
                    .default_value(default_batch_size().to_string())
                    .documentation("Maximum number of records per poll")
                    .build(),
                SettingDef::builder(keys::CSV_DELIMITER, SettingType::String)
                    .default_value(default_csv_delimiter().to_string())
                    .documentation("Single-character CSV field delimiter")
                    .build(),
            ],
        )
    }

    /// Resolve and validate a host settings map
    pub fn from_settings(settings: &HashMap<String, String>) -> ConnectorResult<Self> {
        let resolved = Self::definition().resolve(settings)?;
        let config: Self = serde_json::from_value(serde_json::Value::Object(resolved))
            .map_err(|e| ConnectorError::config(format!("invalid settings: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Validate field rules and cross-field constraints
    pub fn check(&self) -> ConnectorResult<()> {
        self.validate()
            .map_err(|e| ConnectorError::config(format!("validation failed: {}", e)))?;

        if !is_valid_delimiter(self.csv_delimiter) {
            return Err(ConnectorError::config(format!(
                "csv_delimiter '{}' must be a single-byte character other than a quote or newline",
                self.csv_delimiter.escape_default()
            )));
        }

        let input = self.input_folder.trim_end_matches('/');
        if input == self.error_folder.trim_end_matches('/') {
            return Err(ConnectorError::config(
                "input_folder and error_folder must differ",
            ));
        }
        if let Some(completed) = &self.completed_folder {
            if input == completed.trim_end_matches('/') {
                return Err(ConnectorError::config(
                    "input_folder and completed_folder must differ",
                ));
            }
        }
        Ok(())
    }

    /// Partitioner for this task's slot
    pub fn partitioner(&self) -> TaskPartitioner {
        TaskPartitioner::new(self.task_total, self.task_hash)
    }

    /// Delimiter as a byte; only meaningful after [`check`](Self::check)
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.csv_delimiter).unwrap_or(b',')
    }

    /// Folders the task writes into
    pub fn output_folders(&self) -> Vec<&str> {
        let mut folders = Vec::with_capacity(2);
        if let Some(completed) = &self.completed_folder {
            folders.push(completed.as_str());
        }
        folders.push(self.error_folder.as_str());
        folders
    }
}

/// Root configuration of the `ferry-connect` binary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Storage backend
    pub storage: StorageConfig,

    /// File source settings
    pub source: FileSourceConfig,

    /// Host loop settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Local file system; storage paths resolve under `root`
    Local { root: PathBuf },
}

/// Host loop settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Connector name used in logs
    #[serde(default = "default_runner_name")]
    pub name: String,

    /// Pause after a poll that returned nothing
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Delivery attempts per batch before the runner gives up
    #[serde(default = "default_max_publish_retries")]
    pub max_publish_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: default_runner_name(),
            idle_backoff_ms: default_idle_backoff_ms(),
            max_publish_retries: default_max_publish_retries(),
        }
    }
}

fn default_runner_name() -> String {
    "file-source".to_string()
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_max_publish_retries() -> u32 {
    5
}

impl ConnectConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConnectError::config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding environment variables
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| ConnectError::config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.source.check()?;
        if self.runner.name.is_empty() {
            return Err(ConnectError::config("runner name must not be empty"));
        }
        if self.runner.max_publish_retries == 0 {
            return Err(ConnectError::config("runner max_publish_retries must be at least 1"));
        }
        Ok(())
    }
}
