//! Resume point of a scan, persisted as a decimal body number.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File holding the body a scan resumes from. Every lower body of the
/// scanned range has been fully processed.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
    last: Option<u32>,
}

impl Checkpoint {
    /// Open the checkpoint at `path`.
    ///
    /// A missing file means no progress yet. A file that does not contain a
    /// decimal number is an error; the scan must not silently restart.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let last = match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().parse::<u32>().with_context(|| {
                format!("checkpoint {} is not a number: {contents:?}", path.display())
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no checkpoint at {}, starting fresh", path.display());
                None
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read checkpoint {}", path.display()))
            }
        };
        Ok(Self { path, last })
    }

    /// Recorded resume point, if any.
    #[must_use]
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// First body to scan given the configured `start`.
    #[must_use]
    pub fn resume_from(&self, start: u32) -> u32 {
        self.last.map_or(start, |last| last.max(start))
    }

    /// Record `body` as the new resume point. Lower values than the current
    /// one are ignored, so the checkpoint never moves back.
    pub fn record(&mut self, body: u32) -> Result<()> {
        if self.last.is_some_and(|last| last >= body) {
            return Ok(());
        }
        std::fs::write(&self.path, body.to_string())
            .with_context(|| format!("failed to write checkpoint {}", self.path.display()))?;
        self.last = Some(body);
        Ok(())
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
