use std::io;
use thiserror::Error;

/// Failure talking to the mining backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("server responded with HTTP {status} for {path}")]
    Status { status: u16, path: String },
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rejection of the withdrawal form before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid address and amount")]
    MissingInput,
    #[error("Minimum withdrawal amount is 0.00000001 BTC")]
    BelowMinimum,
}
