//! Core error types for the SII lookup client.
//!
//! Identifier validation and configuration loading each get their own enum;
//! the captcha and client crates wrap these in their own error types.

use thiserror::Error;

/// Errors produced while normalizing a raw tax identifier.
///
/// These are caller errors: the input can never succeed, so it is rejected
/// before any network traffic happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RutError {
    /// Nothing left after removing separators and whitespace
    #[error("invalid RUT: empty input")]
    Empty,

    /// A body and a check character need at least two characters
    #[error("invalid RUT '{input}': expected at least 2 characters after removing separators")]
    TooShort {
        /// Raw input as supplied by the caller
        input: String,
    },

    /// More body digits than any issued identifier has
    #[error("invalid RUT '{input}': body has {digits} digits, at most {max} allowed")]
    TooLong {
        /// Raw input as supplied by the caller
        input: String,
        /// Number of digits found in the body
        digits: usize,
        /// Maximum accepted body width
        max: usize,
    },

    /// Body contains something other than ASCII digits
    #[error("invalid RUT '{input}': body must be numeric")]
    NonNumericBody {
        /// Raw input as supplied by the caller
        input: String,
    },

    /// Check character is neither a digit nor `K`
    #[error("invalid RUT '{input}': check character '{check}' must be 0-9 or K")]
    InvalidCheckCharacter {
        /// Raw input as supplied by the caller
        input: String,
        /// The offending check character
        check: char,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
