// src/domain/project/configuration.rs

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Which broker adapter the run publishes through.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// One JSON-lines file per topic partition.
    #[default]
    Jsonl,
    /// In-process log, nothing leaves the process.
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[serde(default)]
    #[validate(nested)]
    pub source: SourceSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerSettings,

    #[serde(default)]
    #[validate(nested)]
    pub publisher: PublisherSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct SourceSettings {
    #[validate(length(min = 1))]
    pub data_dir: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            data_dir: "test_data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct EngineSettings {
    /// Drop accounts whose active indicator is off.
    #[serde(default)]
    pub skip_inactive: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct BrokerSettings {
    #[serde(default)]
    pub kind: BrokerKind,

    #[serde(default = "default_topic")]
    #[validate(length(min = 1))]
    pub topic: String,

    #[serde(default = "default_partition_key_field")]
    #[validate(length(min = 1))]
    pub partition_key_field: String,

    #[serde(default = "default_partitions")]
    #[validate(range(min = 1))]
    pub partitions: u32,

    #[serde(default = "default_broker_output_dir")]
    pub output_dir: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            topic: default_topic(),
            partition_key_field: default_partition_key_field(),
            partitions: default_partitions(),
            output_dir: default_broker_output_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[serde(rename_all = "kebab-case", default)]
#[validate(schema(function = "validate_backoff_window"))]
pub struct PublisherSettings {
    #[validate(range(min = 1))]
    pub max_in_flight: usize,

    #[validate(range(min = 1))]
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    #[validate(range(min = 1.0))]
    pub backoff_multiplier: f64,

    /// Share of failed envelopes (0.0..=1.0) above which a partition fails.
    #[validate(range(min = 0.0, max = 1.0))]
    pub failure_threshold: f64,

    pub drain_on_cancel: bool,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            failure_threshold: 0.05,
            drain_on_cancel: true,
        }
    }
}

fn validate_backoff_window(settings: &PublisherSettings) -> Result<(), ValidationError> {
    if settings.max_backoff_ms < settings.initial_backoff_ms {
        return Err(ValidationError::new("max_backoff_below_initial_backoff"));
    }
    Ok(())
}

fn default_environment() -> String {
    "local".to_string()
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_topic() -> String {
    "sbdl_kafka_cloud".to_string()
}
fn default_partition_key_field() -> String {
    "contractIdentifier".to_string()
}
fn default_partitions() -> u32 {
    6
}
fn default_broker_output_dir() -> String {
    "target/broker".to_string()
}
