use thiserror::Error;

pub type Result<T> = std::result::Result<T, FolkError>;

#[derive(Debug, Error)]
pub enum FolkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The workspace is missing custom fields the update referenced.
    #[error("Custom field schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FolkError {
    fn from(err: reqwest::Error) -> Self {
        FolkError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FolkError {
    fn from(err: serde_json::Error) -> Self {
        FolkError::Parse(err.to_string())
    }
}

/// Turn a non-success response into a typed error. Folk reports unknown
/// custom fields as a validation error on the `customFieldValues` path; that
/// is the only place the body text is inspected.
pub(crate) fn classify_error(status: u16, body: String) -> FolkError {
    let validation = status == 400 || status == 422;
    let lower = body.to_ascii_lowercase();
    if validation && (lower.contains("customfieldvalues") || lower.contains("custom field")) {
        return FolkError::SchemaMismatch(body);
    }
    FolkError::Api {
        status,
        message: body,
    }
}
