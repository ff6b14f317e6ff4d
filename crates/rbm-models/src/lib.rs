//! # rbm-models
//!
//! Restricted Boltzmann machine, its free energy and the CD-k training loop.
//!
//! ## Model
//!
//! - [`Rbm`]: weights `[n_hidden, n_visible]`, visible and hidden biases
//! - [`RbmConfig`]: layer sizes, CD steps and initialization scale
//! - [`FreeEnergy`]: `F(v) = -b·v - Σ_j softplus((v Wᵀ + c)_j)`, batch-averaged
//!
//! The model implements [`rbm_samplers::BipartiteConditional`], so a
//! [`rbm_samplers::GibbsChain`] can run on it directly.
//!
//! ## Training
//!
//! ```rust,ignore
//! use rbm_models::{train, NoiseStreams, RbmConfig, TrainingConfig};
//!
//! let mut noise = NoiseStreams::from_seed(42);
//! let model = RbmConfig::new(784, 500).init::<B>(&device, &mut noise.init)?;
//! let outcome = train(model, &dataset, &TrainingConfig::new(), &mut noise, &mut observers)?;
//! ```
//!
//! ## Checkpoints
//!
//! - [`CheckpointStore`]: save/load by identifier
//! - [`RecorderCheckpointStore`]: burn `NamedMpkFileRecorder` plus JSON metadata

pub mod checkpoint;
pub mod ebm;
pub mod rbm;
pub mod training;

pub use checkpoint::*;
pub use ebm::*;
pub use rbm::*;
pub use training::*;
