//! Mini-batch sources for training.
//!
//! A [`DataSource`] yields batches of visible-layer samples with values in
//! `[0, 1]`. Calling [`DataSource::batches`] again restarts the sequence from
//! the first sample, so one source can be reused for every epoch.

use std::num::NonZeroUsize;

use ndarray::{s, Array2, Axis};

use crate::error::{RbmError, Result};

/// Iterator over mini-batches, each `[batch, n_visible]`.
pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<Array2<f32>>> + 'a>;

/// Lazy, restartable, finite sequence of mini-batches.
pub trait DataSource {
    /// Width of every sample (number of visible units).
    fn n_visible(&self) -> usize;

    /// Number of samples in one full pass.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fresh pass over the data in input order.
    ///
    /// The final batch may be smaller than `batch_size` unless `drop_last` is set.
    fn batches(&self, batch_size: usize, drop_last: bool) -> BatchIter<'_>;
}

/// A dataset held fully in memory as a `[n_samples, n_visible]` matrix.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    samples: Array2<f32>,
}

impl InMemoryDataset {
    /// Wrap a sample matrix, rejecting empty data and values outside `[0, 1]`.
    pub fn new(samples: Array2<f32>) -> Result<Self> {
        let (n_samples, n_visible) = samples.dim();
        if n_samples == 0 || n_visible == 0 {
            return Err(RbmError::InvalidData(format!(
                "dataset must be non-empty, got {n_samples} samples of width {n_visible}"
            )));
        }
        if let Some((idx, value)) = samples
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(RbmError::InvalidData(format!(
                "value {value} at sample {} feature {} is outside [0, 1]",
                idx / n_visible,
                idx % n_visible
            )));
        }
        Ok(Self { samples })
    }

    /// Build from flat row-major values.
    pub fn from_flat(values: Vec<f32>, n_visible: usize) -> Result<Self> {
        if n_visible == 0 || values.len() % n_visible != 0 {
            return Err(RbmError::InvalidData(format!(
                "{} values cannot be split into rows of {n_visible}",
                values.len()
            )));
        }
        let rows = values.len() / n_visible;
        let samples = Array2::from_shape_vec((rows, n_visible), values)
            .map_err(|e| RbmError::InvalidData(e.to_string()))?;
        Self::new(samples)
    }

    pub fn samples(&self) -> &Array2<f32> {
        &self.samples
    }

    /// Keep only the first `n` samples; a larger `n` keeps everything.
    pub fn truncate(mut self, n: NonZeroUsize) -> Self {
        let n = n.get();
        if n < self.samples.nrows() {
            self.samples = self.samples.slice(s![..n, ..]).to_owned();
        }
        self
    }
}

impl DataSource for InMemoryDataset {
    fn n_visible(&self) -> usize {
        self.samples.ncols()
    }

    fn len(&self) -> usize {
        self.samples.nrows()
    }

    fn batches(&self, batch_size: usize, drop_last: bool) -> BatchIter<'_> {
        let batch_size = batch_size.max(1);
        Box::new(
            self.samples
                .axis_chunks_iter(Axis(0), batch_size)
                .filter(move |chunk| !drop_last || chunk.nrows() == batch_size)
                .map(|chunk| Ok(chunk.to_owned())),
        )
    }
}
