//! Single-credential captcha cache.
//!
//! The cache owns the one live [`CaptchaCredential`] of a client. Acquisition
//! happens entirely under one async mutex: check, fetch (with its own retry
//! budget), store, notify. Concurrent callers queue on that mutex, so at most
//! one fetch is ever in flight per cache. Callers that queued behind a fetch
//! which failed get that same failure instead of starting a fetch of their own.

use crate::codec::{decode, CaptchaCredential};
use crate::error::{CaptchaError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default number of fetch attempts before giving up.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 3;

/// Where fresh captcha challenges come from.
///
/// Implementations perform the network round-trip and return the raw base64
/// challenge payload; decoding is done by the cache.
#[async_trait]
pub trait CaptchaSource: Send + Sync {
    /// Fetch one raw challenge payload.
    ///
    /// # Errors
    /// Returns [`CaptchaError::Source`] when the challenge cannot be obtained.
    async fn fetch_challenge(&self) -> Result<String>;
}

/// Hook invoked synchronously, under the cache lock, whenever a new
/// credential is installed.
pub type RenewalCallback = Arc<dyn Fn(&CaptchaCredential) + Send + Sync>;

#[derive(Default)]
struct Slot {
    credential: Option<CaptchaCredential>,
    last_failure: Option<CaptchaError>,
}

/// Holds at most one live captcha credential.
pub struct CaptchaCache {
    source: Arc<dyn CaptchaSource>,
    slot: Mutex<Slot>,
    /// Bumped under the lock each time an acquisition finishes
    completed_acquisitions: AtomicU64,
    max_fetch_attempts: u32,
    on_renewal: Option<RenewalCallback>,
}

impl CaptchaCache {
    /// Create an empty cache fed by `source`.
    #[must_use]
    pub fn new(source: Arc<dyn CaptchaSource>) -> Self {
        Self {
            source,
            slot: Mutex::new(Slot::default()),
            completed_acquisitions: AtomicU64::new(0),
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            on_renewal: None,
        }
    }

    /// Set the number of fetch attempts per acquisition (minimum 1).
    #[must_use]
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts.max(1);
        self
    }

    /// Register the hook called with every newly installed credential.
    #[must_use]
    pub fn with_renewal_callback(mut self, callback: RenewalCallback) -> Self {
        self.on_renewal = Some(callback);
        self
    }

    /// Return the live credential, fetching one if none is held.
    ///
    /// # Errors
    /// Returns [`CaptchaError::MaxAttempts`] when every fetch attempt failed or
    /// produced an unusable credential.
    pub async fn ensure_credential(&self) -> Result<CaptchaCredential> {
        let seen = self.completed_acquisitions.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(credential) = &slot.credential {
            return Ok(credential.clone());
        }

        // An acquisition finished while we waited and left no credential.
        if self.completed_acquisitions.load(Ordering::Acquire) != seen {
            if let Some(err) = &slot.last_failure {
                return Err(err.clone());
            }
        }

        let outcome = self.fetch().await;
        self.completed_acquisitions.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(credential) => {
                slot.credential = Some(credential.clone());
                slot.last_failure = None;
                tracing::info!(solution = %credential.solution_text, "installed new captcha credential");
                if let Some(callback) = &self.on_renewal {
                    callback(&credential);
                }
                Ok(credential)
            }
            Err(err) => {
                slot.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drop the held credential if it is still the one identified by `token`.
    ///
    /// Returns whether anything was cleared. A mismatch means another caller
    /// already replaced the rejected credential, and the replacement stays.
    pub async fn invalidate(&self, token: &str) -> bool {
        let mut slot = self.slot.lock().await;
        let matches = slot
            .credential
            .as_ref()
            .is_some_and(|held| held.challenge_token == token);

        if matches {
            slot.credential = None;
            tracing::debug!("invalidated rejected captcha credential");
        }
        matches
    }

    /// The currently held credential, if any.
    pub async fn current(&self) -> Option<CaptchaCredential> {
        self.slot.lock().await.credential.clone()
    }

    async fn fetch(&self) -> Result<CaptchaCredential> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_fetch_attempts {
            match self.source.fetch_challenge().await.and_then(|p| decode(&p)) {
                Ok(credential) if credential.is_usable() => return Ok(credential),
                Ok(_) => {
                    last_error = "empty captcha solution".to_string();
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            tracing::warn!(
                attempt,
                max_attempts = self.max_fetch_attempts,
                error = %last_error,
                "captcha fetch attempt failed"
            );
        }

        Err(CaptchaError::MaxAttempts {
            attempts: self.max_fetch_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    const SAMPLE_A: &str = "iVBORw0KGgoAAQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobN1E0S0lFTkSuQmCC";

    /// Replays scripted responses, then repeats the last one.
    struct ScriptedSource {
        responses: StdMutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CaptchaSource for ScriptedSource {
        async fn fetch_challenge(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().expect("lock responses");
            if responses.len() > 1 {
                responses.pop_front().expect("non-empty")
            } else {
                responses.front().cloned().expect("at least one response")
            }
        }
    }

    #[tokio::test]
    async fn test_fetches_once_and_reuses() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(SAMPLE_A.to_string())]));
        let cache = CaptchaCache::new(source.clone());

        let first = cache.ensure_credential().await.expect("first");
        let second = cache.ensure_credential().await.expect("second");

        assert_eq!(first, second);
        assert_eq!(first.solution_text, "7Q4K");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_garbled_payloads_then_succeeds() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(CaptchaError::Source("connection reset".to_string())),
            Ok(String::new()),
            Ok(SAMPLE_A.to_string()),
        ]));
        let cache = CaptchaCache::new(source.clone());

        let credential = cache.ensure_credential().await.expect("third attempt works");
        assert_eq!(credential.solution_text, "7Q4K");
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_max_attempts_error() {
        let source = Arc::new(ScriptedSource::new(vec![Ok("%%%".to_string())]));
        let cache = CaptchaCache::new(source.clone()).with_max_fetch_attempts(3);

        let err = cache.ensure_credential().await.expect_err("never usable");
        assert!(matches!(err, CaptchaError::MaxAttempts { attempts: 3, .. }));
        assert_eq!(source.calls(), 3);
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_only_matching_token() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(SAMPLE_A.to_string())]));
        let cache = CaptchaCache::new(source.clone());
        let credential = cache.ensure_credential().await.expect("credential");

        assert!(!cache.invalidate("some-other-token").await);
        assert!(cache.current().await.is_some());

        assert!(cache.invalidate(&credential.challenge_token).await);
        assert!(cache.current().await.is_none());

        cache.ensure_credential().await.expect("refetch");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_renewal_callback_sees_each_new_credential() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(SAMPLE_A.to_string())]));
        let renewals = Arc::new(AtomicUsize::new(0));
        let counter = renewals.clone();
        let cache = CaptchaCache::new(source).with_renewal_callback(Arc::new(move |c| {
            assert_eq!(c.solution_text, "7Q4K");
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let credential = cache.ensure_credential().await.expect("first");
        cache.ensure_credential().await.expect("cached");
        assert_eq!(renewals.load(Ordering::SeqCst), 1);

        cache.invalidate(&credential.challenge_token).await;
        cache.ensure_credential().await.expect("renewed");
        assert_eq!(renewals.load(Ordering::SeqCst), 2);
    }
}
