// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Timeout, DNS failure, connection reset or a truncated body
    #[error("Network failure for {url}: {message}")]
    Network { url: String, message: String },

    /// HTTP 429
    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    /// HTTP 5xx
    #[error("Server error {status} for {url}")]
    Server { url: String, status: u16 },

    /// Any other non-2xx status; never retried
    #[error("HTTP {status} for {url}")]
    Client { url: String, status: u16 },

    /// Retry budget spent without a successful response
    #[error("Giving up on {url} after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    /// Thread entry without a usable title or link
    #[error("Thread entry skipped: {reason}")]
    ExtractionSkipped { reason: String },

    /// Persisted catalog exists but cannot be parsed
    #[error("Corrupt catalog at {path}: {message}")]
    CorruptCatalog { path: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a network failure for a URL.
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a skipped-entry error.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::ExtractionSkipped {
            reason: reason.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        match status {
            429 => Self::RateLimited { url },
            500..=599 => Self::Server { url, status },
            _ => Self::Client { url, status },
        }
    }

    /// Whether the fetcher should spend another attempt on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::RateLimited { .. } | Self::Server { .. }
        )
    }
}
