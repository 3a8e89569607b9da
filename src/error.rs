//! Error types for the query runner.
//!
//! Only two kinds ever reach the operator while a query runs: failures raised
//! by the database engine and everything else. Configuration errors are
//! startup failures and are reported before any query is attempted.

use thiserror::Error;

/// Main error type for query runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Errors originating from the database engine (connection refused,
    /// authentication, syntax errors, constraint violations, etc.)
    #[error("Database error: {0}")]
    Database(String),

    /// Anything else that aborts a run (closed input, missing values, output failures).
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// Configuration errors (invalid config file, unknown named connection, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RunnerError {
    /// Creates a database error with the given message.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Creates an unexpected error with the given message.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Database(_) => "Database Error",
            Self::Unexpected(_) => "Unexpected Error",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Returns the bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Database(msg) | Self::Unexpected(msg) | Self::Config(msg) => msg,
        }
    }

    /// Returns true for errors raised by the database engine.
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(e: std::io::Error) -> Self {
        Self::Unexpected(e.to_string())
    }
}

/// Result type alias using RunnerError.
pub type Result<T> = std::result::Result<T, RunnerError>;
