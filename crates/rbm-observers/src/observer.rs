use ndarray::Array2;
use rbm_core::error::Result;

/// Loss of one mini-batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRecord {
    pub epoch: usize,
    /// Index of the batch within its epoch.
    pub batch: usize,
    pub batch_size: usize,
    /// Free-energy difference `F(data) - F(model sample)`.
    pub loss: f32,
}

/// Diagnostics handed off at the end of every epoch.
///
/// The matrices come from the last batch of the epoch and are host copies;
/// no image or file format is implied.
#[derive(Debug, Clone)]
pub struct EpochSnapshot {
    pub epoch: usize,
    pub mean_loss: f32,
    /// Mean squared error between the input and the final visible probability.
    pub reconstruction_error: f32,
    /// Binarized real input, `[batch, n_visible]`.
    pub input: Array2<f32>,
    /// Visible sample at the end of the Gibbs chain, `[batch, n_visible]`.
    pub reconstruction: Array2<f32>,
    /// Weight matrix, `[n_hidden, n_visible]`.
    pub weights: Array2<f32>,
    /// Hidden sample driven by the real input, `[batch, n_hidden]`.
    pub hidden: Array2<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub batches: usize,
    pub epoch_losses: Vec<f32>,
}

/// Receives progress from the training loop.
///
/// Every hook defaults to a no-op. An error returned from any hook aborts the run.
pub trait TrainingObserver {
    fn on_batch(&mut self, _record: &BatchRecord) -> Result<()> {
        Ok(())
    }

    fn on_epoch(&mut self, _snapshot: &EpochSnapshot) -> Result<()> {
        Ok(())
    }

    fn on_finish(&mut self, _summary: &TrainingSummary) -> Result<()> {
        Ok(())
    }
}

impl TrainingObserver for () {}

impl<T: TrainingObserver + ?Sized> TrainingObserver for &mut T {
    fn on_batch(&mut self, record: &BatchRecord) -> Result<()> {
        (**self).on_batch(record)
    }

    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        (**self).on_epoch(snapshot)
    }

    fn on_finish(&mut self, summary: &TrainingSummary) -> Result<()> {
        (**self).on_finish(summary)
    }
}

/// Fan-out to several observers, called in insertion order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn TrainingObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl TrainingObserver + 'static) -> Self {
        self.push(observer);
        self
    }

    pub fn push(&mut self, observer: impl TrainingObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl TrainingObserver for ObserverSet {
    fn on_batch(&mut self, record: &BatchRecord) -> Result<()> {
        self.observers.iter_mut().try_for_each(|o| o.on_batch(record))
    }

    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        self.observers
            .iter_mut()
            .try_for_each(|o| o.on_epoch(snapshot))
    }

    fn on_finish(&mut self, summary: &TrainingSummary) -> Result<()> {
        self.observers
            .iter_mut()
            .try_for_each(|o| o.on_finish(summary))
    }
}
