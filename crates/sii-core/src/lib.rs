//! SII Core - Foundation crate for the SII taxpayer lookup client.
//!
//! This crate provides the identifier, record and metrics types shared by the
//! captcha and client crates, plus error handling and configuration management.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`rut`] - The `Rut` tax identifier: normalization and check digit
//! - [`types`] - Lookup records (`Citizen`, `Activity`) and `RequestMetrics`
//!
//! # Example
//!
//! ```rust
//! use sii_core::Rut;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rut = Rut::parse("5.126.663-3")?;
//! assert_eq!(rut.body(), "5126663");
//! assert_eq!(rut.check_digit(), '3');
//! assert_eq!(rut, Rut::parse("51266633")?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod rut;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, ClientConfig, ScanConfig, TlsConfig, TlsMode};
pub use error::{ConfigError, ConfigResult, RutError};
pub use rut::Rut;
pub use types::{Activity, Citizen, RequestMetrics};
