#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Concurrent fan-out client for the Census Bureau ACS API.
//!
//! [`AcsClient::fetch_table`] takes a set of variable groups, a year range
//! and a set of locations, issues one request per (variable, year,
//! location) cell concurrently under a shared [`RateLimiter`], decodes
//! each response through a cached [`VariableDictionary`], and reassembles
//! everything into one [`Table`] (or one table per variable).
//!
//! [`VariableDictionary`]: lowe_acs_models::VariableDictionary
//! [`Table`]: lowe_acs_models::Table

pub mod client;
pub mod config;
pub mod decode;
pub mod dictionary;
pub mod progress;
pub mod rate_limit;
pub mod request;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AcsClient, AcsClientBuilder, FetchOutput, FetchRequest};
pub use config::{AcsConfig, RateLimitConfig, RetryConfig};
pub use dictionary::{DictionaryCache, DictionaryKey, DictionarySource};
pub use rate_limit::RateLimiter;
pub use transport::{HttpTransport, Transport};

use lowe_acs_models::JoinError;
use lowe_geography::GeographyError;

/// Errors that can occur while fetching ACS tables.
#[derive(Debug, thiserror::Error)]
pub enum AcsError {
    /// No API key is configured.
    #[error("Missing ACS API key: set the {var} environment variable")]
    MissingApiKey {
        /// Environment variable the key is read from.
        var: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// The fetch request itself is invalid (empty, reversed years, ...).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what went wrong.
        message: String,
    },

    /// A variable's kind was not given and cannot be inferred from its id.
    #[error("Cannot infer table kind of variable '{variable}' (expected a B, S, DP or CP prefix)")]
    UnknownVariableKind {
        /// The variable id.
        variable: String,
    },

    /// Location resolution failed.
    #[error("Geography error: {0}")]
    Geography(#[from] GeographyError),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Request URL with the API key redacted.
        url: String,
    },

    /// The response body does not have the expected two-row shape.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of what went wrong.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (dictionary or config file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Joining the per-variable tables failed.
    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    /// One (variable, year, location) cell failed after all retries.
    #[error("Request for {variable} in {year} at {location} failed: {source}")]
    Cell {
        /// Variable group id.
        variable: String,
        /// Survey year.
        year: u16,
        /// The location as given by the caller.
        location: String,
        /// Underlying failure.
        #[source]
        source: Box<Self>,
    },
}

impl AcsError {
    /// Returns `true` if the error is likely transient and worth retrying:
    /// connection failures, timeouts, HTTP 429 and HTTP 5xx.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
