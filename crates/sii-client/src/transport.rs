//! HTTP transport seam.
//!
//! Everything the client sends is a `POST` with a small text body, so the
//! seam is one method. [`HttpTransport`] is the reqwest-backed implementation;
//! tests substitute in-memory transports.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client};
use sii_core::{ClientConfig, TlsMode};
use std::fmt::Write as _;

/// Content type of form-encoded lookup requests.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An outbound `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Target URL
    pub url: String,
    /// `Content-Type` header value
    pub content_type: &'static str,
    /// Request body
    pub body: String,
}

impl TransportRequest {
    /// A request with a pre-built body.
    #[must_use]
    pub fn raw(url: impl Into<String>, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type,
            body: body.into(),
        }
    }

    /// A form-encoded request; field order is preserved.
    #[must_use]
    pub fn form(url: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let mut body = String::new();
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                body.push('&');
            }
            let _ = write!(
                body,
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            );
        }
        Self::raw(url, FORM_CONTENT_TYPE, body)
    }
}

/// Status and body of a completed round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

/// Sends requests to the upstream service.
///
/// Implementations must be thread-safe (Send + Sync): one transport is
/// shared by every task using a client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a `POST` and read the whole body.
    ///
    /// # Errors
    /// Returns a network-level [`TransportError`] when the request cannot be
    /// sent or the body cannot be read. Non-success statuses are not errors.
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with connection pooling and a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport from client settings.
    ///
    /// # Errors
    /// Returns [`TransportError::Tls`] if the configured CA bundle cannot be
    /// read or parsed, and [`TransportError::Build`] if reqwest rejects the
    /// configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str());

        if let Some(path) = &config.tls.ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                TransportError::Tls(format!("failed to read CA bundle {}: {e}", path.display()))
            })?;
            let anchors = Certificate::from_pem_bundle(&pem).map_err(|e| {
                TransportError::Tls(format!("invalid CA bundle {}: {e}", path.display()))
            })?;
            tracing::debug!(
                count = anchors.len(),
                "loaded extra trust anchors from {}",
                path.display()
            );
            for anchor in anchors {
                builder = builder.add_root_certificate(anchor);
            }
        }

        if config.tls.mode == TlsMode::Permissive {
            tracing::warn!("TLS peer verification disabled (permissive mode)");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        Ok(TransportResponse { status, body })
    }
}
