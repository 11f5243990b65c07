//! JSON configuration schema (spec §6 Environment/config) plus startup
//! validation. Mirrors the recorder-pool-and-source startup shape the
//! original builds from its own config file, parsed here with `serde`
//! instead of a hand-rolled JSON walk.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("capture_dir is empty")]
    EmptyCaptureDir,

    #[error("no sources configured")]
    NoSources,

    #[error("no systems configured")]
    NoSystems,

    #[error("source {0:?} has zero recorders across every pool")]
    SourceHasNoRecorders(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub device: String,
    pub driver: String,
    pub center: f64,
    pub rate: f64,
    #[serde(default)]
    pub error: f64,
    #[serde(default)]
    pub digital_recorders: usize,
    #[serde(default)]
    pub analog_recorders: usize,
    #[serde(default)]
    pub debug_recorder: bool,
    #[serde(default)]
    pub sigmf_recorders: usize,
    #[serde(default)]
    pub antenna: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub short_name: String,
    #[serde(rename = "type")]
    pub system_type: String,
    #[serde(default)]
    pub nac: u16,
    #[serde(default)]
    pub sysid: u16,
    #[serde(default)]
    pub wacn: u32,
    #[serde(default)]
    pub p25_phase2: bool,
    pub control_channels: Vec<u64>,
    pub talkgroups_file: String,
    #[serde(default)]
    pub unit_tags_file: Option<String>,
    #[serde(default)]
    pub unit_tags_ota_file: Option<String>,
    #[serde(default = "default_unit_tag_mode")]
    pub unit_tag_mode: String,
}

fn default_unit_tag_mode() -> String {
    "userFirst".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub capture_dir: String,
    #[serde(default)]
    pub upload_server: Option<String>,
    #[serde(default = "default_call_timeout")]
    pub call_timeout: u64,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub instance_key: String,
    #[serde(default)]
    pub debug_recorder_port: Option<u16>,
    /// Port the JSON metadata TCP broadcaster listens on. `None` disables it.
    #[serde(default)]
    pub metadata_port: Option<u16>,
    #[serde(default)]
    pub broadcast_signals: bool,
    pub sources: Vec<SourceConfig>,
    pub systems: Vec<SystemConfig>,
}

fn default_call_timeout() -> u64 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads and validates a JSON config file. Any failure here is an
    /// exit-code-1 startup error per spec §6/§7.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.display().to_string();

        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_dir.trim().is_empty() {
            return Err(ConfigError::EmptyCaptureDir);
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.systems.is_empty() {
            return Err(ConfigError::NoSystems);
        }
        for source in &self.sources {
            if source.digital_recorders == 0
                && source.analog_recorders == 0
                && !source.debug_recorder
                && source.sigmf_recorders == 0
            {
                return Err(ConfigError::SourceHasNoRecorders(source.device.clone()));
            }
        }
        Ok(())
    }
}
