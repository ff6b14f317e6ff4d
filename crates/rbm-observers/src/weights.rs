use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use ndarray::Array2;
use rbm_core::error::{RbmError, Result};

use crate::observer::{EpochSnapshot, TrainingObserver};

/// Dumps the weight matrix as text after every epoch.
///
/// One line per hidden unit, values in scientific notation separated by a
/// single space, written to `<dir>/<prefix><epoch>`.
pub struct WeightDumpObserver {
    dir: PathBuf,
    prefix: String,
}

impl WeightDumpObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "W.data".to_string(),
        }
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, epoch))
    }
}

/// Write a matrix as whitespace-separated text rows.
pub fn write_matrix_text(path: &Path, matrix: &Array2<f32>) -> Result<()> {
    let file = File::create(path).map_err(|e| RbmError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for row in matrix.rows() {
        let line = row
            .iter()
            .map(|v| format!("{v:.18e}"))
            .join(" ");
        writeln!(writer, "{line}").map_err(|e| RbmError::io(path, e))?;
    }
    writer.flush().map_err(|e| RbmError::io(path, e))
}

impl TrainingObserver for WeightDumpObserver {
    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        let path = self.path_for(snapshot.epoch);
        write_matrix_text(&path, &snapshot.weights)?;
        tracing::debug!(path = %path.display(), "Weight matrix dumped");
        Ok(())
    }
}
