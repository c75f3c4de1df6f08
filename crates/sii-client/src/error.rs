//! Error types for the lookup client.

use sii_captcha::CaptchaError;
use sii_core::{RequestMetrics, RutError};
use thiserror::Error;

/// Failures of a single HTTP round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not connect or send the request
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request exceeded the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Trust anchors could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// The HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    /// Whether this is a network-level failure worth another attempt.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_) | Self::Body(_))
    }
}

/// Errors surfaced by [`SiiClient::lookup`](crate::SiiClient::lookup).
#[derive(Error, Debug)]
pub enum LookupError {
    /// Caller supplied an identifier that can never be looked up
    #[error("invalid identifier: {0}")]
    InvalidRut(#[from] RutError),

    /// Upstream has no record for the identifier
    #[error("RUT {rut} not found")]
    NotFound {
        /// Canonical identifier that was looked up
        rut: String,
        /// Metrics of the final attempt cycle
        metrics: RequestMetrics,
    },

    /// No usable captcha could be obtained
    #[error("captcha unavailable: {0}")]
    Captcha(#[from] CaptchaError),

    /// Every network attempt in a cycle failed
    #[error("transport failed after {} attempt(s): {source}", .metrics.attempts_used)]
    Transport {
        /// Error of the final attempt
        source: TransportError,
        /// Metrics of the failed cycle
        metrics: RequestMetrics,
    },

    /// Upstream kept rejecting fresh captchas
    #[error("captcha rejected after {retries} renewal(s), giving up")]
    CaptchaRetryExhausted {
        /// Renewals attempted before giving up
        retries: u32,
        /// Metrics of the final attempt cycle
        metrics: RequestMetrics,
    },

    /// Response could not be classified
    #[error("malformed response (HTTP {status}): {reason}")]
    MalformedResponse {
        /// What was wrong with the body
        reason: String,
        /// HTTP status of the response
        status: u16,
        /// Metrics of the final attempt cycle
        metrics: RequestMetrics,
    },

    /// Client construction failed
    #[error("client setup failed: {0}")]
    Setup(TransportError),
}

impl LookupError {
    /// Whether the caller's input is at fault (never worth retrying).
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidRut(_))
    }

    /// Whether this is the plain negative result.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a later call with the same input may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Captcha(_) | Self::CaptchaRetryExhausted { .. }
        )
    }

    /// Metrics collected before the failure, where any attempt was made.
    #[must_use]
    pub fn metrics(&self) -> Option<&RequestMetrics> {
        match self {
            Self::NotFound { metrics, .. }
            | Self::Transport { metrics, .. }
            | Self::CaptchaRetryExhausted { metrics, .. }
            | Self::MalformedResponse { metrics, .. } => Some(metrics),
            Self::InvalidRut(_) | Self::Captcha(_) | Self::Setup(_) => None,
        }
    }
}

/// Result type alias for lookup operations.
pub type Result<T> = std::result::Result<T, LookupError>;
