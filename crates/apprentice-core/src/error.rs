use thiserror::Error;

/// Top-level error type for the Apprentice system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for ApprenticeError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApprenticeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Console client error: {0}")]
    Client(String),

    #[error("Training session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ApprenticeError {
    fn from(err: toml::de::Error) -> Self {
        ApprenticeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ApprenticeError {
    fn from(err: toml::ser::Error) -> Self {
        ApprenticeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ApprenticeError {
    fn from(err: serde_json::Error) -> Self {
        ApprenticeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Apprentice operations.
pub type Result<T> = std::result::Result<T, ApprenticeError>;
