use thiserror::Error;

/// Top-level daemon failure, mapped to an exit code in `main` (spec §6/§7:
/// 0 normal shutdown, 1 configuration error, 2 SDR open error, 3 internal
/// fatal).
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] recorder_common::ConfigError),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("failed to open source {device:?}: {source}")]
    SourceOpen {
        device: String,
        #[source]
        source: capture::CaptureError,
    },

    #[error("internal fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Config(_) | DaemonError::InvalidValue(_) => 1,
            DaemonError::SourceOpen { .. } => 2,
            DaemonError::Fatal(_) => 3,
        }
    }
}
