//! Error types for captcha decoding and acquisition.

use thiserror::Error;

/// Errors that can occur while obtaining a captcha credential.
///
/// `Clone` so a single failed acquisition can be handed to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptchaError {
    /// Challenge payload is not valid base64
    #[error("captcha payload is not valid base64: {0}")]
    Decode(String),

    /// Decoded payload does not reach the solution bytes
    #[error("captcha payload too short: {len} bytes, need at least {min}")]
    PayloadTooShort {
        /// Decoded payload length
        len: usize,
        /// Minimum length that contains the solution
        min: usize,
    },

    /// The challenge could not be fetched or read
    #[error("captcha source failed: {0}")]
    Source(String),

    /// Every fetch attempt came back unusable
    #[error("max captcha attempts reached ({attempts}): {last_error}")]
    MaxAttempts {
        /// Attempts made
        attempts: u32,
        /// What went wrong on the final attempt
        last_error: String,
    },
}

/// Result type alias for captcha operations.
pub type Result<T> = std::result::Result<T, CaptchaError>;
