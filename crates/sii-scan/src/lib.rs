//! SII Scan - bulk driver for the taxpayer lookup client.
//!
//! Walks a range of identifier bodies, computes each check character, looks
//! the identifier up, and writes every found record as JSON. Progress is kept
//! in a checkpoint file so an interrupted scan resumes where it stopped.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod checkpoint;
pub mod output;
pub mod scan;

pub use checkpoint::Checkpoint;
pub use output::OutputSink;
pub use scan::{log_renewals, ScanSummary, Scanner};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sii=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}
