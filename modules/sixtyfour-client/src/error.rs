use thiserror::Error;

pub type Result<T> = std::result::Result<T, SixtyfourError>;

#[derive(Debug, Error)]
pub enum SixtyfourError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SixtyfourError {
    fn from(err: reqwest::Error) -> Self {
        SixtyfourError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SixtyfourError {
    fn from(err: serde_json::Error) -> Self {
        SixtyfourError::Parse(err.to_string())
    }
}
