use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Recorder(#[from] recorder::RecorderError),

    #[error("invalid unit-tag pattern: {0}")]
    Regex(#[from] regex::Error),
}
