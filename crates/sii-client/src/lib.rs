//! SII Client - Captcha-gated taxpayer lookup against the SII web service.
//!
//! This crate issues lookups against the upstream taxpayer registry. Each
//! lookup needs a solved captcha; the client caches one, renews it when the
//! upstream rejects it, retries transient network failures with jittered
//! backoff, and classifies the HTML response.
//!
//! # Features
//!
//! - Single public operation, [`SiiClient::lookup`], safe to call from many tasks at once
//! - One shared captcha credential per client, fetched at most once at a time
//! - Bounded retries: network attempts per cycle, and captcha renewals per lookup
//! - Request accounting through [`RequestMetrics`]
//! - Strict TLS by default, permissive mode as an explicit opt-in
//!
//! # Example
//!
//! ```rust,no_run
//! use sii_client::SiiClient;
//! use sii_core::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SiiClient::new(&ClientConfig::default())?
//!     .on_new_credential(|c| println!("new captcha: {}", c.solution_text));
//!
//! let found = client.lookup("5.126.663-3").await?;
//! println!("{} ({} activities)", found.citizen.name, found.citizen.activities.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod challenge;
pub mod client;
pub mod error;
pub mod executor;
pub mod metrics;
#[allow(missing_docs)]
pub mod parser;
pub mod transport;

// Re-export commonly used types
pub use challenge::ChallengeEndpoint;
pub use client::{Lookup, SiiClient};
pub use error::{LookupError, Result, TransportError};
pub use executor::{ExecutionOutcome, LookupExecutor};
pub use metrics::RequestCounter;
pub use parser::{ParsedRecord, ParsedResponse, ResponseParser};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

pub use sii_captcha::CaptchaCredential;
pub use sii_core::{Activity, Citizen, RequestMetrics, Rut};
