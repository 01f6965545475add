//! Persistence hooks for data splits and encoder checkpoints
//!
//! The orchestrator invokes these only when the corresponding config
//! toggles (`dump_data_splits`, `dump_model_every_epoch`) are set. The
//! default sink discards everything; `DirectorySink` writes pretty JSON
//! under a run directory.

use crate::data::TrialSplit;
use crate::error::Result;
use crate::model::EncoderSnapshot;
use ndarray::Array1;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Receiver for per-trial artifacts.
pub trait ArtifactSink {
    /// Persist the split indices for a trial.
    fn dump_split(&mut self, trial: usize, split: &TrialSplit) -> Result<()>;

    /// Persist an encoder parameter snapshot taken after a pretraining
    /// epoch.
    fn dump_encoder(&mut self, trial: usize, epoch: usize, snapshot: &EncoderSnapshot)
        -> Result<()>;
}

/// Sink that discards every artifact.
#[derive(Debug, Default)]
pub struct NoopSink;

impl ArtifactSink for NoopSink {
    fn dump_split(&mut self, _trial: usize, _split: &TrialSplit) -> Result<()> {
        Ok(())
    }

    fn dump_encoder(
        &mut self,
        _trial: usize,
        _epoch: usize,
        _snapshot: &EncoderSnapshot,
    ) -> Result<()> {
        Ok(())
    }
}

/// Sink writing JSON artifacts into an output directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct SnapshotRecord<'a> {
    trial: usize,
    epoch: usize,
    params: Vec<&'a [f32]>,
}

impl DirectorySink {
    /// Create the output directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_string_pretty(value)?;
        fs::write(self.dir.join(name), body)?;
        Ok(())
    }
}

impl ArtifactSink for DirectorySink {
    fn dump_split(&mut self, trial: usize, split: &TrialSplit) -> Result<()> {
        self.write_json(&format!("split_trial_{trial}.json"), split)
    }

    fn dump_encoder(
        &mut self,
        trial: usize,
        epoch: usize,
        snapshot: &EncoderSnapshot,
    ) -> Result<()> {
        let record = SnapshotRecord {
            trial,
            epoch,
            params: snapshot
                .params
                .iter()
                .filter_map(Array1::as_slice)
                .collect(),
        };
        self.write_json(&format!("encoder_trial_{trial}_epoch_{epoch}.json"), &record)
    }
}
