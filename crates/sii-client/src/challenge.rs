//! Captcha challenge endpoint.

use crate::metrics::RequestCounter;
use crate::transport::{Transport, TransportRequest};
use async_trait::async_trait;
use serde::Deserialize;
use sii_captcha::{CaptchaError, CaptchaSource};
use std::sync::Arc;

/// Fixed body that asks the upstream for a fresh challenge.
const NEW_CHALLENGE_BODY: &str = "oper=0";

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    #[serde(rename = "txtCaptcha")]
    txt_captcha: String,
}

/// Fetches raw challenge payloads from the upstream captcha endpoint.
pub struct ChallengeEndpoint {
    transport: Arc<dyn Transport>,
    url: String,
    counter: RequestCounter,
}

impl ChallengeEndpoint {
    /// Create an endpoint that counts its calls on `counter`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, counter: RequestCounter) -> Self {
        Self {
            transport,
            url: url.into(),
            counter,
        }
    }
}

#[async_trait]
impl CaptchaSource for ChallengeEndpoint {
    async fn fetch_challenge(&self) -> sii_captcha::Result<String> {
        self.counter.increment();
        // The upstream expects this content type even though the body is not JSON.
        let request = TransportRequest::raw(&self.url, "application/json", NEW_CHALLENGE_BODY);

        let response = self
            .transport
            .post(request)
            .await
            .map_err(|e| CaptchaError::Source(e.to_string()))?;

        let parsed: ChallengeResponse = serde_json::from_str(&response.body).map_err(|e| {
            CaptchaError::Source(format!(
                "invalid challenge response (HTTP {}): {e}",
                response.status
            ))
        })?;
        Ok(parsed.txt_captcha)
    }
}
