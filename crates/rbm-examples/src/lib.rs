//! # rbm-examples utilities
//!
//! Observers used by the `train_rbm` example:
//!
//! - [`ImageGridObserver`]: per-epoch PNG grids of input, reconstruction,
//!   weights and hidden activations (plotters bitmap backend)
//! - [`ProgressObserver`]: indicatif epoch bar with the running loss

pub mod image_grid;
pub mod progress;

pub use image_grid::*;
pub use progress::*;
