//! Error types for the multiplexer
//!
//! Two surfaces:
//! - [`MuxError`]: synchronous failures when issuing or stopping an exchange
//! - [`ExchangeError`]: failures delivered asynchronously through a sink

use datasource_url::UrlError;
use serde_json::Value;

/// Main multiplexer error type
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Resource specification could not be turned into a request
    #[error("construction failed: {0}")]
    Construction(#[from] ConstructionError),

    /// Transport refused the outbound message
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Multiplexer has been torn down
    #[error("multiplexer destroyed")]
    Destroyed,
}

impl MuxError {
    /// Check if the failure came from the caller's resource specification
    #[inline]
    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Construction(_))
    }
}

/// Resource specification errors
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// Neither `url` nor `symbolic_path` was given
    #[error("no url or symbolic path to resolve")]
    MissingUrl,

    /// Path template could not be resolved
    #[error("url template: {0}")]
    Url(#[from] UrlError),
}

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection is gone
    #[error("transport closed")]
    Closed,

    /// Message could not be encoded for the wire
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure delivered to a caller's sink
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExchangeError {
    /// Gateway answered with an error status or warning
    #[error("request failed with status {status_code}: {response}")]
    Response {
        /// Status code reported by the gateway
        status_code: u16,
        /// Error payload (`response`, else `body`, else `error`)
        response: Value,
    },

    /// Exchange was forgotten before a response arrived
    #[error("exchange abandoned before a response arrived")]
    Abandoned,
}

impl ExchangeError {
    /// Status code, if the gateway reported one
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status_code, .. } => Some(*status_code),
            Self::Abandoned => None,
        }
    }

    /// Error payload, if any
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Response { response, .. } => Some(response),
            Self::Abandoned => None,
        }
    }

    /// Check if the backend rejected the session
    #[inline]
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        self.status_code() == Some(401)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
