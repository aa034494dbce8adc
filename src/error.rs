use crate::fetch::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrabError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch failed: {0}")]
    Fetch(FetchError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("archive failed: {0}")]
    Archive(String),
}

impl GrabError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        GrabError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<FetchError> for GrabError {
    fn from(err: FetchError) -> Self {
        GrabError::Fetch(err)
    }
}

pub type Result<T> = std::result::Result<T, GrabError>;
