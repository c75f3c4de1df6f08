//! SII Captcha - Captcha credential handling for the SII lookup client.
//!
//! Every lookup against the upstream service must carry a solved captcha. The
//! upstream hands out the solution inside the challenge payload itself, so
//! "solving" is a fixed-offset decode rather than image recognition.
//!
//! # Features
//!
//! - [`codec::decode`] turns a base64 challenge payload into a [`CaptchaCredential`]
//! - [`CaptchaCache`] holds at most one live credential per client, fetches a
//!   new one on demand with a bounded retry budget, and never lets two callers
//!   fetch at the same time
//! - [`CaptchaSource`] is the seam to whatever actually talks to the network
//!
//! # Example
//!
//! ```rust,ignore
//! use sii_captcha::CaptchaCache;
//! use std::sync::Arc;
//!
//! let cache = CaptchaCache::new(Arc::new(source))
//!     .with_renewal_callback(Arc::new(|c| println!("new captcha {}", c.solution_text)));
//!
//! let credential = cache.ensure_credential().await?;
//! // ... upstream rejected it:
//! cache.invalidate(&credential.challenge_token).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod codec;
pub mod error;

// Re-export commonly used types
pub use cache::{CaptchaCache, CaptchaSource, RenewalCallback};
pub use codec::{decode, CaptchaCredential};
pub use error::{CaptchaError, Result};
