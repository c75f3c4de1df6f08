//! Lookup request execution with bounded retry.
//!
//! One call to [`LookupExecutor::execute`] is one attempt cycle: up to
//! `max_attempts` round-trips, retrying only network-level failures, with a
//! uniformly random delay in `[0, max_backoff]` before each retry.

use crate::error::{LookupError, Result};
use crate::metrics::RequestCounter;
use crate::transport::{Transport, TransportRequest};
use rand::Rng;
use sii_captcha::CaptchaCredential;
use sii_core::{RequestMetrics, Rut};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default network attempts per cycle.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default upper bound of the retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Protocol flags identifying the "taxpayer status" operation.
const OPERATION_PROGRAM: &str = "STC";
const OPERATION_OPTION: &str = "NOR";

/// Raw response of a successful round-trip.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// HTTP status of the final attempt
    pub status: u16,
    /// Response body
    pub body: String,
    /// Accounting for the attempts made
    pub metrics: RequestMetrics,
}

/// Sends lookup requests for a normalized identifier and a captcha credential.
pub struct LookupExecutor {
    transport: Arc<dyn Transport>,
    url: String,
    counter: RequestCounter,
    max_attempts: u32,
    max_backoff: Duration,
}

impl LookupExecutor {
    /// Create an executor that counts its attempts on `counter`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, counter: RequestCounter) -> Self {
        Self {
            transport,
            url: url.into(),
            counter,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Set the attempts per cycle (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the upper bound of the retry delay.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Build the form-encoded lookup request.
    #[must_use]
    pub fn build_request(&self, rut: &Rut, credential: &CaptchaCredential) -> TransportRequest {
        let check = rut.check_digit().to_string();
        TransportRequest::form(
            &self.url,
            &[
                ("RUT", rut.body()),
                ("DV", &check),
                ("txt_captcha", &credential.challenge_token),
                ("txt_code", &credential.solution_text),
                ("PRG", OPERATION_PROGRAM),
                ("OPC", OPERATION_OPTION),
            ],
        )
    }

    /// Run one attempt cycle.
    ///
    /// # Errors
    /// Returns [`LookupError::Transport`] carrying the final attempt's error
    /// and the metrics of every attempt made, when no attempt got a response
    /// or a failure was not network-level.
    pub async fn execute(&self, rut: &Rut, credential: &CaptchaCredential) -> Result<ExecutionOutcome> {
        let request = self.build_request(rut, credential);
        let mut latencies = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.counter.increment();
            let started = Instant::now();
            let result = self.transport.post(request.clone()).await;
            latencies.push(started.elapsed());

            match result {
                Ok(response) => {
                    tracing::debug!(rut = %rut, attempt, status = response.status, "lookup attempt completed");
                    return Ok(ExecutionOutcome {
                        status: response.status,
                        body: response.body,
                        metrics: RequestMetrics::from_attempts(self.counter.get(), &latencies),
                    });
                }
                Err(e) if !e.is_network() || attempt >= self.max_attempts => {
                    return Err(LookupError::Transport {
                        source: e,
                        metrics: RequestMetrics::from_attempts(self.counter.get(), &latencies),
                    });
                }
                Err(e) => {
                    let delay = self.jitter();
                    tracing::warn!(
                        rut = %rut,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "lookup attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
