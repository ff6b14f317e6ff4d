//! # rbm-data
//!
//! Loaders that turn training files into [`rbm_core::dataset::InMemoryDataset`]s:
//!
//! - [`load_lattice_csv`]: lattice states (Ising configurations) as CSV text
//! - [`load_idx_images`] / [`load_mnist_train`]: MNIST IDX image files
//! - [`load_npy`]: 2-D numpy arrays

pub mod lattice;
pub mod mnist;
pub mod npy;

pub use lattice::*;
pub use mnist::*;
pub use npy::*;
