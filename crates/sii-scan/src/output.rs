//! Sharded JSON output: one file per record, `files_per_dir` bodies per
//! subdirectory.

use anyhow::{Context, Result};
use sii_core::{Citizen, Rut};
use std::path::{Path, PathBuf};

/// Writes found records below a root directory.
#[derive(Debug, Clone)]
pub struct OutputSink {
    root: PathBuf,
    files_per_dir: u32,
}

impl OutputSink {
    /// Create the root directory if needed.
    pub fn create(root: impl Into<PathBuf>, files_per_dir: u32) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create output dir {}", root.display()))?;
        Ok(Self {
            root,
            files_per_dir: files_per_dir.max(1),
        })
    }

    /// `<root>/<body / files_per_dir>/<rut>.json`
    #[must_use]
    pub fn path_for(&self, rut: &Rut) -> PathBuf {
        let shard = rut.body_number() / self.files_per_dir;
        self.root.join(shard.to_string()).join(format!("{rut}.json"))
    }

    /// Serialize `citizen` to its shard, returning the file written.
    pub fn write(&self, rut: &Rut, citizen: &Citizen) -> Result<PathBuf> {
        let path = self.path_for(rut);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec(citizen).context("failed to serialize record")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
