//! Send job configuration
//!
//! Jobs can be described in TOML and built in one go:
//!
//! ```toml
//! [[job]]
//! id = 0x100
//! data = "0102"
//! interval_us = 100000
//!
//! [[job]]
//! id = 0x18FF0001
//! data = "DEADBEEF"
//! interval_us = 20000
//! ```
//!
//! `data` is a hex string of at most 8 bytes; an empty string is an empty payload.

use crate::error::SendJobError;
use crate::send_job::SendJob;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default interval: 100 ms
pub const DEFAULT_INTERVAL_US: u64 = 100_000;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Invalid send job: {0}")]
    Job(#[from] SendJobError),
}

/// A single send job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendJobConfig {
    /// CAN identifier
    pub id: u32,
    /// Payload as hex string (e.g. "0102")
    pub data: String,
    /// Interval in microseconds
    pub interval_us: u64,
}

impl Default for SendJobConfig {
    fn default() -> Self {
        SendJobConfig {
            id: 0,
            data: String::new(),
            interval_us: DEFAULT_INTERVAL_US,
        }
    }
}

impl SendJobConfig {
    /// Decoded payload bytes
    pub fn decoded_data(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(hex::decode(self.data.trim())?)
    }

    /// Build an idle job from this configuration
    pub fn build(&self) -> Result<SendJob, ConfigError> {
        let data = self.decoded_data()?;
        Ok(SendJob::new(self.id, &data, self.interval_us)?)
    }
}

impl From<&SendJob> for SendJobConfig {
    fn from(job: &SendJob) -> Self {
        SendJobConfig {
            id: job.id(),
            data: hex::encode_upper(job.data()),
            interval_us: job.interval_us(),
        }
    }
}

impl SendJob {
    /// Build an idle job from configuration
    pub fn from_config(config: &SendJobConfig) -> Result<Self, ConfigError> {
        config.build()
    }
}

/// A set of send jobs (`[[job]]` tables)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSetConfig {
    #[serde(default)]
    pub job: Vec<SendJobConfig>,
}

impl JobSetConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build all jobs; fails on the first invalid entry
    pub fn build_jobs(&self) -> Result<Vec<SendJob>, ConfigError> {
        self.job.iter().map(SendJobConfig::build).collect()
    }
}
