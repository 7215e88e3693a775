use thiserror::Error;

/// Top-level error type shared by every Stacker crate.
///
/// The dialogue crate defines its own error type and converts from this one
/// so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<toml::de::Error> for StackerError {
    fn from(err: toml::de::Error) -> Self {
        StackerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StackerError {
    fn from(err: toml::ser::Error) -> Self {
        StackerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for StackerError {
    fn from(err: serde_json::Error) -> Self {
        StackerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Stacker operations.
pub type Result<T> = std::result::Result<T, StackerError>;
