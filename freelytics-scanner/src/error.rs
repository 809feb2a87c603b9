use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Listing endpoint unreachable: {0}")]
    ListingUnreachable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record sink failed: {0}")]
    Sink(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
