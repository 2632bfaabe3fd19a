use thiserror::Error;

/// matchfeed error types
#[derive(Error, Debug)]
pub enum MatchfeedError {
    /// Failed to parse a source payload or persisted file
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(String),

    /// Outbound HTTP call failed or returned a non-2xx status
    #[error("http error: {0}")]
    Http(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Competition or archive key with no entry in the competition table
    #[error("unknown competition: {0}")]
    UnknownCompetition(String),

    /// Prediction subprocess could not be launched or managed
    #[error("supervisor error: {0}")]
    Supervisor(String),
}

impl From<config::ConfigError> for MatchfeedError {
    fn from(err: config::ConfigError) -> Self {
        MatchfeedError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for MatchfeedError {
    fn from(err: reqwest::Error) -> Self {
        MatchfeedError::Http(err.to_string())
    }
}

/// Result type alias for matchfeed
pub type Result<T> = std::result::Result<T, MatchfeedError>;
