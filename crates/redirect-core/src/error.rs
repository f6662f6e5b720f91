//! Error types for the redirect core
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for redirect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the redirect service
#[derive(Error, Debug)]
pub enum Error {
    /// DNS provider-related errors
    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Data store errors
    #[error("Database error: {0}")]
    Database(String),

    /// Mail delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Cursor persistence errors
    #[error("Cursor store error: {0}")]
    Cursor(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected by policy (e.g. a challenge outside the owner's domain)
    #[error("Policy violation: {0}")]
    Policy(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external call did not complete in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The configured limit
        after: Duration,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a DNS provider error
    pub fn dns_provider(msg: impl Into<String>) -> Self {
        Self::DnsProvider(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a mail error
    pub fn mail(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    /// Create a cursor store error
    pub fn cursor(msg: impl Into<String>) -> Self {
        Self::Cursor(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a policy violation error
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Whether this error means the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Await `fut`, failing with [`Error::Timeout`] if it runs longer than `after`.
///
/// A zero duration disables the limit.
pub async fn with_timeout<T, F>(operation: &str, after: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    if after.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, after)),
    }
}
