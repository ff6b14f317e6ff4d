//! # rbm-observers
//!
//! Observers receive progress from the training loop without changing it:
//! one [`BatchRecord`] per mini-batch, one [`EpochSnapshot`] per epoch and a
//! [`TrainingSummary`] at the end.
//!
//! ```rust,ignore
//! use rbm_observers::{LossTimelineWriter, ObserverSet, WeightDumpObserver};
//!
//! let observers = ObserverSet::new()
//!     .with(LossTimelineWriter::in_dir(&out)?)
//!     .with(WeightDumpObserver::new(&out));
//! ```

pub mod loss;
pub mod observer;
pub mod weights;

pub use loss::*;
pub use observer::*;
pub use weights::*;
