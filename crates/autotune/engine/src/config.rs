//! Engine configuration.
//!
//! Layers, later wins: built-in defaults, an optional file (format from its
//! extension), then `AUTOTUNE_*` environment variables with `__` between
//! nested keys, e.g. `AUTOTUNE_VALIDATION__WINDOW_MS=60000`.

use autotune_strategy::{AutonomyGate, GeneratorRules};
use autotune_types::RiskTolerance;
use autotune_validator::ValidationSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_PREFIX: &str = "AUTOTUNE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub gate: AutonomyGate,

    #[serde(default)]
    pub generator: GeneratorRules,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub cycle: CycleSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stream consumer behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after a failed read or batch before trying again.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Attempts a failed event gets before it stays FAILED.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Re-publish detected patterns as SIGNAL_DETECTED events.
    #[serde(default)]
    pub publish_derived_events: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            publish_derived_events: false,
        }
    }
}

impl StreamSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Autonomous cycle input window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSettings {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,

    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            max_events: default_max_events(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_max_events() -> usize {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Self::defaults_builder()?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        Self::finish(builder)
    }

    /// Parse a configuration document on top of the defaults. The environment
    /// still applies.
    pub fn parse(contents: &str, format: config::FileFormat) -> Result<Self, config::ConfigError> {
        let builder = Self::defaults_builder()?.add_source(config::File::from_str(contents, format));
        Self::finish(builder)
    }

    fn defaults_builder(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        Ok(config::Config::builder().add_source(config::Config::try_from(&EngineConfig::default())?))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config
            .validation
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Settings that keep test windows in milliseconds.
    pub fn fast() -> Self {
        let mut config = Self::default();
        config.validation = config
            .validation
            .with_window_ms(30)
            .with_sample_interval_ms(10);
        config.stream.retry_delay_ms = 20;
        config
    }
}
