//! Loss recording.
//!
//! [`LossHistory`] keeps every batch loss in memory; [`LossTimelineWriter`]
//! streams them to a tab-separated `batch  epoch  loss` file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rbm_core::error::{RbmError, Result};

use crate::observer::{BatchRecord, EpochSnapshot, TrainingObserver};

/// In-memory record of batch losses and epoch means.
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    pub batches: Vec<BatchRecord>,
    pub epoch_means: Vec<f32>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Losses of one epoch, in batch order.
    pub fn epoch_losses(&self, epoch: usize) -> Vec<f32> {
        self.batches
            .iter()
            .filter(|r| r.epoch == epoch)
            .map(|r| r.loss)
            .collect()
    }
}

impl TrainingObserver for LossHistory {
    fn on_batch(&mut self, record: &BatchRecord) -> Result<()> {
        self.batches.push(*record);
        Ok(())
    }

    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        self.epoch_means.push(snapshot.mean_loss);
        Ok(())
    }
}

/// Streams `batch\tepoch\tloss` lines to a file.
pub struct LossTimelineWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LossTimelineWriter {
    /// Default file name inside an output directory.
    pub const FILE_NAME: &'static str = "Loss_timeline.data";

    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| RbmError::io(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::create(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| RbmError::io(&self.path, e))
    }
}

impl TrainingObserver for LossTimelineWriter {
    fn on_batch(&mut self, record: &BatchRecord) -> Result<()> {
        writeln!(
            self.writer,
            "{}\t{}\t{}",
            record.batch, record.epoch, record.loss
        )
        .map_err(|e| RbmError::io(&self.path, e))
    }

    fn on_epoch(&mut self, _snapshot: &EpochSnapshot) -> Result<()> {
        self.flush()
    }

    fn on_finish(&mut self, _summary: &crate::observer::TrainingSummary) -> Result<()> {
        self.flush()
    }
}
