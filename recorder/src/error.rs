use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("wav I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav encode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("transmission sink has no call bound")]
    NoCall,
}
