use thiserror::Error;

/// Errors from external speech services and the object store.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },
    #[error("failed to decode service response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("failed to sign url")]
    Signing,
}
