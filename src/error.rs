//! Error taxonomy for the capture pipeline
//!
//! Every fatal condition surfaces to the caller unchanged; parsing gaps in
//! listing markup are not errors and never reach this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsError {
    /// Listing page answered with a non-2xx status
    #[error("Failed to fetch {url}: HTTP status {status}")]
    Transport { url: String, status: u16 },

    /// Request never produced a response (DNS, TLS, connection reset...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No numeric pagination links found on {url}")]
    NoPagination { url: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Browser session, navigation or scripting failure
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Provider answered with an error status
    #[error("Analysis request failed with status {status}: {body}")]
    Analysis { status: u16, body: String },

    /// Provider answered but the content is not the expected JSON object
    #[error("Malformed analysis response: {0}")]
    MalformedAnalysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NewsError {
    pub(crate) fn browser(context: &str, err: impl std::fmt::Display) -> Self {
        NewsError::Browser(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, NewsError>;
