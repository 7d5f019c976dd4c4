//! Error types for mongolens

use thiserror::Error;

/// Result type alias for mongolens operations
pub type LensResult<T> = Result<T, LensError>;

/// Errors raised inside the instrumentation layer.
///
/// None of these ever reach the instrumented operation's caller: the
/// [`Instrumentator`](crate::Instrumentator) turns them into diagnostics.
#[derive(Debug, Error)]
pub enum LensError {
    /// The re-issued explain call failed
    #[error("Explain error: {0}")]
    Explain(String),

    /// The explain response did not have the expected shape
    #[error("Malformed explain document: {0}")]
    MalformedExplain(String),

    /// The invocation context lacked a start time or target collection
    #[error("Missing invocation context: {0}")]
    MissingContext(&'static str),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Driver error
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

impl LensError {
    /// Create an explain error
    pub fn explain(message: impl Into<String>) -> Self {
        Self::Explain(message.into())
    }

    /// Create a malformed explain error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedExplain(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error came from the re-issued explain call
    pub fn is_explain_failure(&self) -> bool {
        match self {
            Self::Explain(_) => true,
            #[cfg(feature = "mongodb")]
            Self::Mongo(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LensError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LensError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
