/// Core error types for Encore
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Encore
#[derive(Error, Debug)]
pub enum CoreError {
    /// Library manifest could not be parsed
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
