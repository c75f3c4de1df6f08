//! Captcha challenge decoding.
//!
//! The upstream challenge endpoint returns a base64 blob that is both the
//! challenge token (echoed back on every lookup) and, once decoded, the
//! carrier of the solution text. The solution sits at a fixed byte offset.
//!
//! That offset is an observation about the upstream's current payload
//! layout. Nothing in the payload verifies it: if upstream moves the bytes,
//! decoding still succeeds and yields a wrong, non-empty solution. The
//! pinned sample test below is what catches such a drift.

use crate::error::{CaptchaError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Byte offset of the solution within the decoded payload.
pub const SOLUTION_OFFSET: usize = 36;

/// Length of the solution in bytes.
pub const SOLUTION_LEN: usize = 4;

/// Shortest decoded payload that still contains the solution.
pub const MIN_PAYLOAD_LEN: usize = SOLUTION_OFFSET + SOLUTION_LEN;

/// A solved captcha: the token the upstream issued plus its solution.
///
/// Immutable once produced; handed out by value to each lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaCredential {
    /// Raw base64 challenge, sent back verbatim
    pub challenge_token: String,
    /// Decoded solution text
    pub solution_text: String,
}

impl CaptchaCredential {
    /// Whether the credential can authorize a lookup.
    ///
    /// A blank token or a solution made only of NULs/whitespace is a garbled
    /// challenge worth fetching again.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.challenge_token.trim().is_empty()
            && !self
                .solution_text
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .is_empty()
    }
}

/// Decode a base64 challenge payload into a credential.
///
/// # Errors
/// Returns [`CaptchaError::Decode`] for malformed base64 and
/// [`CaptchaError::PayloadTooShort`] when fewer than [`MIN_PAYLOAD_LEN`]
/// bytes decode.
pub fn decode(payload: &str) -> Result<CaptchaCredential> {
    let token = payload.trim();
    let bytes = STANDARD
        .decode(token)
        .map_err(|e| CaptchaError::Decode(e.to_string()))?;

    if bytes.len() < MIN_PAYLOAD_LEN {
        return Err(CaptchaError::PayloadTooShort {
            len: bytes.len(),
            min: MIN_PAYLOAD_LEN,
        });
    }

    let solution = &bytes[SOLUTION_OFFSET..MIN_PAYLOAD_LEN];
    Ok(CaptchaCredential {
        challenge_token: token.to_string(),
        solution_text: String::from_utf8_lossy(solution).into_owned(),
    })
}
