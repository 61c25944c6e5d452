use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevSignalError {
    #[error("Developer not found: {0}")]
    NotFound(String),
}
