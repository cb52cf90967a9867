//! Error types for the pricing engine

use chrono::{DateTime, Utc};
use std::fmt;

/// Unified error type for pricing operations
#[derive(Debug)]
pub enum PricingError {
    /// HTTP request failed (network error, timeout, etc.)
    Network(reqwest::Error),
    /// Failed to parse JSON response
    Parse(serde_json::Error),
    /// HTTP error status code from an upstream API
    HttpStatus(reqwest::StatusCode),
    /// Database operation failed
    Database(rusqlite::Error),
    /// Daily pricing API call budget exhausted; retryable after the timestamp
    QuotaExceeded { retry_after: DateTime<Utc> },
    /// Card index import file could not be read
    ImportRead(std::io::Error),
}

impl PricingError {
    /// True for the retryable quota condition (maps to HTTP 429 at the boundary)
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, PricingError::QuotaExceeded { .. })
    }
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::Network(e) => write!(f, "Network error: {}", e),
            PricingError::Parse(e) => write!(f, "Parse error: {}", e),
            PricingError::HttpStatus(status) => write!(f, "HTTP error: {}", status),
            PricingError::Database(e) => write!(f, "Database error: {}", e),
            PricingError::QuotaExceeded { retry_after } => {
                write!(f, "Daily API quota exceeded, retry after {}", retry_after)
            }
            PricingError::ImportRead(e) => write!(f, "Failed to read import file: {}", e),
        }
    }
}

impl std::error::Error for PricingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PricingError::Network(e) => Some(e),
            PricingError::Parse(e) => Some(e),
            PricingError::HttpStatus(_) => None,
            PricingError::Database(e) => Some(e),
            PricingError::QuotaExceeded { .. } => None,
            PricingError::ImportRead(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for PricingError {
    fn from(err: reqwest::Error) -> Self {
        PricingError::Network(err)
    }
}

impl From<serde_json::Error> for PricingError {
    fn from(err: serde_json::Error) -> Self {
        PricingError::Parse(err)
    }
}

impl From<rusqlite::Error> for PricingError {
    fn from(err: rusqlite::Error) -> Self {
        PricingError::Database(err)
    }
}

/// Result alias for pricing operations
pub type Result<T> = std::result::Result<T, PricingError>;
