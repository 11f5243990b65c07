use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no source covers frequency {0} Hz")]
    NoSourceCovers(f64),

    #[error(transparent)]
    Recorder(#[from] recorder::RecorderError),

    #[error("front-end driver error: {0}")]
    FrontEnd(String),
}
