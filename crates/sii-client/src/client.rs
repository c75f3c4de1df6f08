//! Lookup client facade.
//!
//! Composes the captcha cache, the executor and the parser into one
//! operation. A lookup runs attempt cycles until the response is a record,
//! a not-found, or a failure; a rejected captcha is invalidated and the cycle
//! repeats with a fresh one, up to `max_captcha_retries` times.

use crate::challenge::ChallengeEndpoint;
use crate::error::{LookupError, Result};
use crate::executor::LookupExecutor;
use crate::metrics::RequestCounter;
use crate::parser::{ParsedResponse, ResponseParser};
use crate::transport::{HttpTransport, Transport};
use serde::Serialize;
use sii_captcha::{CaptchaCache, CaptchaCredential};
use sii_core::{Citizen, ClientConfig, RequestMetrics, Rut};
use std::sync::Arc;

/// A resolved record and the accounting for the call that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    /// The taxpayer record
    pub citizen: Citizen,
    /// Metrics of the final attempt cycle
    pub metrics: RequestMetrics,
}

/// Captcha-gated taxpayer lookup client.
///
/// Cheap to share behind an `Arc`: every task using the same client shares
/// one captcha credential and one request counter.
pub struct SiiClient {
    cache: CaptchaCache,
    executor: LookupExecutor,
    parser: ResponseParser,
    counter: RequestCounter,
    max_captcha_retries: u32,
}

impl SiiClient {
    /// Create a client talking to the upstream over HTTPS.
    ///
    /// # Errors
    /// Returns [`LookupError::Setup`] if the HTTP transport cannot be built
    /// (unreadable CA bundle, invalid client settings).
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config).map_err(LookupError::Setup)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on top of an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let counter = RequestCounter::new();
        let source = ChallengeEndpoint::new(transport.clone(), &config.captcha_url, counter.clone());
        let cache = CaptchaCache::new(Arc::new(source))
            .with_max_fetch_attempts(config.max_captcha_fetch_attempts);
        let executor = LookupExecutor::new(transport, &config.lookup_url, counter.clone())
            .with_max_attempts(config.max_lookup_attempts)
            .with_max_backoff(config.max_backoff());

        Self {
            cache,
            executor,
            parser: ResponseParser::new(),
            counter,
            max_captcha_retries: config.max_captcha_retries,
        }
    }

    /// Register a hook called synchronously whenever a new captcha credential
    /// is installed.
    #[must_use]
    pub fn on_new_credential<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CaptchaCredential) + Send + Sync + 'static,
    {
        self.cache = self.cache.with_renewal_callback(Arc::new(callback));
        self
    }

    /// Replace the response parser (e.g. to pin the current year).
    #[must_use]
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    /// Network calls issued by this client so far, captcha fetches included.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.counter.get()
    }

    /// Look up the taxpayer record for `raw_rut`.
    ///
    /// Accepts the identifier with or without `.`/`-` separators and in any
    /// case for the check character.
    ///
    /// # Errors
    /// - [`LookupError::InvalidRut`] for malformed input, before any network call
    /// - [`LookupError::NotFound`] when the upstream has no record
    /// - [`LookupError::Captcha`] when no usable captcha could be fetched
    /// - [`LookupError::Transport`] when every attempt of a cycle failed
    /// - [`LookupError::CaptchaRetryExhausted`] when fresh captchas kept being rejected
    /// - [`LookupError::MalformedResponse`] when the response could not be classified
    pub async fn lookup(&self, raw_rut: &str) -> Result<Lookup> {
        let rut = Rut::parse(raw_rut)?;
        let mut renewals = 0;

        loop {
            let credential = self.cache.ensure_credential().await?;
            let outcome = self.executor.execute(&rut, &credential).await?;

            match self.parser.parse(&outcome.body) {
                ParsedResponse::Found(record) => {
                    tracing::debug!(rut = %rut, activities = record.activities.len(), "record found");
                    return Ok(Lookup {
                        citizen: Citizen {
                            rut: rut.to_string(),
                            name: record.name,
                            activities: record.activities,
                        },
                        metrics: outcome.metrics,
                    });
                }
                // An error page has no name cell either; only a success page
                // can say "no record".
                ParsedResponse::NotFound if !(200..300).contains(&outcome.status) => {
                    return Err(LookupError::MalformedResponse {
                        reason: "error status without a record".to_string(),
                        status: outcome.status,
                        metrics: outcome.metrics,
                    });
                }
                ParsedResponse::NotFound => {
                    tracing::debug!(rut = %rut, "no record");
                    return Err(LookupError::NotFound {
                        rut: rut.to_string(),
                        metrics: outcome.metrics,
                    });
                }
                ParsedResponse::Malformed(reason) => {
                    return Err(LookupError::MalformedResponse {
                        reason,
                        status: outcome.status,
                        metrics: outcome.metrics,
                    });
                }
                ParsedResponse::CaptchaRejected => {
                    self.cache.invalidate(&credential.challenge_token).await;
                    if renewals >= self.max_captcha_retries {
                        return Err(LookupError::CaptchaRetryExhausted {
                            retries: renewals,
                            metrics: outcome.metrics,
                        });
                    }
                    renewals += 1;
                    tracing::warn!(
                        rut = %rut,
                        renewal = renewals,
                        max_renewals = self.max_captcha_retries,
                        "captcha rejected, retrying with a fresh one"
                    );
                }
            }
        }
    }
}
