// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Command-line flags override individual values after loading.

use crate::influx::{default_tags, LineEncoder, DEFAULT_MEASUREMENT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default InfluxDB write endpoint.
pub const DEFAULT_URL: &str = "http://localhost:8086/write?db=mydb";

/// Content type the write endpoint is posted with.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Default request timeout (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid sensor id {arg:?}: {reason}")]
    InvalidSensorId { arg: String, reason: String },
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Write endpoint settings.
    #[serde(default)]
    pub influxdb: InfluxDbConfig,

    /// Measurement name of every line.
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Static tags of every line (`serial` is always the sensor id).
    #[serde(default = "default_tags")]
    pub tags: BTreeMap<String, String>,

    /// Drain and post once more after the flush loop stops.
    #[serde(default = "default_true")]
    pub final_flush: bool,
}

/// Write endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxDbConfig {
    /// Full write URL, database selected by query string.
    #[serde(default = "default_url")]
    pub url: String,

    /// `Content-Type` header of each POST.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_measurement() -> String {
    DEFAULT_MEASUREMENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            content_type: default_content_type(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl InfluxDbConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            influxdb: InfluxDbConfig::default(),
            measurement: default_measurement(),
            tags: default_tags(),
            final_flush: true,
        }
    }
}

impl RelayConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RelayConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.measurement.is_empty() {
            return Err(ConfigError::Invalid("measurement must not be empty".into()));
        }
        if self.influxdb.url.is_empty() {
            return Err(ConfigError::Invalid("influxdb.url must not be empty".into()));
        }
        if self.influxdb.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "influxdb.timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(key) = self.tags.keys().find(|k| k.is_empty()) {
            return Err(ConfigError::Invalid(format!("empty tag key (value {:?})", self.tags[key])));
        }
        Ok(())
    }

    /// Line encoder for the configured measurement and tags.
    pub fn encoder(&self) -> LineEncoder {
        LineEncoder::new(&self.measurement, &self.tags)
    }
}
