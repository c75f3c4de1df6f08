//! Range scan over identifier bodies with bounded concurrency.

use crate::checkpoint::Checkpoint;
use crate::output::OutputSink;
use anyhow::{Context, Result};
use futures::stream::{self, TryStreamExt};
use sii_client::{CaptchaCredential, SiiClient};
use sii_core::Rut;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Instant;
use tokio::sync::Mutex;

/// Outcome counts of a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Records written
    pub found: u64,
    /// Bodies with no record upstream
    pub not_found: u64,
    /// Lookups that failed and were skipped
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    found: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn summary(&self) -> ScanSummary {
        ScanSummary {
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Output, checkpoint and the set of unfinished bodies, under one lock.
struct Sink {
    output: OutputSink,
    checkpoint: Checkpoint,
    in_flight: BTreeSet<u32>,
}

impl Sink {
    /// Lowest body not yet finished, given that `done` just finished.
    fn resume_point(&self, done: u32) -> u32 {
        self.in_flight
            .first()
            .copied()
            .unwrap_or_else(|| done.saturating_add(1))
    }
}

/// Looks up every body of a range through one shared client.
pub struct Scanner {
    client: SiiClient,
    workers: usize,
    sink: Mutex<Sink>,
    counters: Counters,
}

impl Scanner {
    /// Create a scanner running at most `workers` lookups at once.
    #[must_use]
    pub fn new(client: SiiClient, output: OutputSink, checkpoint: Checkpoint, workers: usize) -> Self {
        Self {
            client,
            workers: workers.max(1),
            sink: Mutex::new(Sink {
                output,
                checkpoint,
                in_flight: BTreeSet::new(),
            }),
            counters: Counters::default(),
        }
    }

    /// Scan `bodies`, writing every found record.
    ///
    /// Lookup failures are logged and skipped. Failing to persist a record
    /// or the checkpoint aborts the scan.
    ///
    /// The checkpoint is moved on each record written, to the lowest body
    /// still in flight, so a resumed scan never skips an unfinished body.
    pub async fn run(&self, bodies: Range<u32>) -> Result<ScanSummary> {
        tracing::info!(
            start = bodies.start,
            end = bodies.end,
            workers = self.workers,
            "starting scan"
        );

        stream::iter(bodies.map(Ok))
            .try_for_each_concurrent(self.workers, |body| self.scan_one(body))
            .await?;

        let summary = self.counters.summary();
        tracing::info!(
            found = summary.found,
            not_found = summary.not_found,
            failed = summary.failed,
            "scan finished"
        );
        Ok(summary)
    }

    async fn scan_one(&self, body: u32) -> Result<()> {
        let rut = Rut::from_body(body).with_context(|| format!("body {body} out of range"))?;
        self.sink.lock().await.in_flight.insert(body);

        let result = self.client.lookup(&rut.to_string()).await;

        let mut sink = self.sink.lock().await;
        sink.in_flight.remove(&body);
        match result {
            Ok(found) => {
                let path = sink.output.write(&rut, &found.citizen)?;
                let resume = sink.resume_point(body);
                sink.checkpoint.record(resume)?;
                drop(sink);

                self.counters.found.fetch_add(1, Ordering::Relaxed);
                tracing::info!(rut = %rut, name = %found.citizen.name, "found: {}", path.display());
            }
            Err(e) if e.is_not_found() => {
                self.counters.not_found.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(rut = %rut, error = %e, "lookup failed, skipping");
            }
        }
        Ok(())
    }
}

/// Renewal hook logging each new captcha and the time since the previous one.
pub fn log_renewals() -> impl Fn(&CaptchaCredential) + Send + Sync + 'static {
    let previous = StdMutex::new(None::<Instant>);
    move |credential| {
        let now = Instant::now();
        let Ok(mut previous) = previous.lock() else {
            return;
        };
        match previous.replace(now) {
            None => tracing::info!(solution = %credential.solution_text, "first captcha"),
            Some(at) => tracing::info!(
                solution = %credential.solution_text,
                elapsed = ?now.duration_since(at),
                "captcha renewed"
            ),
        }
    }
}
