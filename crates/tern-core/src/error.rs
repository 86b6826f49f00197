use thiserror::Error;

/// Top-level error type for Tern.
#[derive(Debug, Error)]
pub enum TernError {
    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(String),

    /// Error from the weather provider.
    #[error("weather error: {0}")]
    Weather(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
