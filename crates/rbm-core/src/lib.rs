//! # rbm-core
//!
//! Foundational pieces shared by the RBM crates:
//!
//! - [`backend`]: Burn backend aliases (`NdArray` on CPU, WGPU behind the `gpu`
//!   feature) and tensor ⇄ host conversions
//! - [`error`]: [`RbmError`], the error taxonomy for shape, numerical, data and I/O failures
//! - [`config`]: [`PathConfig`], the data and output directories of a run
//! - [`dataset`]: the [`DataSource`] trait and [`InMemoryDataset`]
//!
//! ## GPU Backend
//!
//! ```rust,ignore
//! use rbm_core::backend::{ensure_metal_backend, init_gpu_device, WgpuAutodiffBackend};
//!
//! ensure_metal_backend();
//! let device = init_gpu_device();
//! ```

#![recursion_limit = "256"] // Required for burn-wgpu

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;

pub use backend::*;
pub use config::*;
pub use dataset::*;
pub use error::*;
