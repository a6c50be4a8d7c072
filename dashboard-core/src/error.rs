//! Error types for the dashboard

use thiserror::Error;

/// Dashboard-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// Bad caller input, rejected before any request is made
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Upstream request failed (transport, non-2xx or decode failure)
    #[error("Request error: {0}")]
    Request(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A newer call on the same query replaced this one
    #[error("Request superseded by a newer call")]
    Superseded,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DashboardError::Validation(msg.into())
    }

    pub fn unknown_service(name: impl Into<String>) -> Self {
        DashboardError::UnknownService(name.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        DashboardError::Request(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        DashboardError::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        DashboardError::Config(msg.into())
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only upstream failures are retryable; input errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DashboardError::Request(_) | DashboardError::Timeout(_))
    }

    /// Whether the error was raised by input validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DashboardError::Validation(_) | DashboardError::UnknownService(_)
        )
    }
}

/// Result type alias for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(DashboardError::request("HTTP 500: Internal Server Error").is_retryable());
        assert!(DashboardError::timeout("price").is_retryable());
        assert!(!DashboardError::validation("empty ticker").is_retryable());
        assert!(!DashboardError::unknown_service("crypto").is_retryable());
        assert!(!DashboardError::Superseded.is_retryable());
    }

    #[test]
    fn test_validation_categories() {
        assert!(DashboardError::unknown_service("crypto").is_validation());
        assert!(!DashboardError::request("boom").is_validation());
    }
}
