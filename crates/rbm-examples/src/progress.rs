use indicatif::{ProgressBar, ProgressStyle};
use rbm_core::error::Result;
use rbm_observers::{EpochSnapshot, TrainingObserver, TrainingSummary};

/// Epoch progress bar showing the latest mean loss.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(epochs: usize) -> Self {
        let bar = ProgressBar::new(epochs as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// A bar that draws nothing, for tests and non-interactive runs.
    pub fn hidden(epochs: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(epochs as u64);
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn message(&self) -> String {
        self.bar.message().to_string()
    }
}

impl TrainingObserver for ProgressObserver {
    fn on_epoch(&mut self, snapshot: &EpochSnapshot) -> Result<()> {
        self.bar.set_message(format!(
            "Epoch {:3} - Loss {:8.5}",
            snapshot.epoch, snapshot.mean_loss
        ));
        self.bar.inc(1);
        Ok(())
    }

    fn on_finish(&mut self, summary: &TrainingSummary) -> Result<()> {
        let last = summary.epoch_losses.last().copied().unwrap_or(f32::NAN);
        self.bar
            .finish_with_message(format!("{} epochs - final loss {last:8.5}", summary.epochs));
        Ok(())
    }
}
