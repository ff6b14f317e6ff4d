//! # rbm-samplers
//!
//! Sampling building blocks for restricted Boltzmann machines:
//!
//! - **Bernoulli sampling**: [`sample_probability`] compares a probability field
//!   against uniform noise; [`bernoulli`] draws the noise itself
//! - **Conditional sampling seam**: [`BipartiteConditional`] for models with a
//!   visible and a hidden layer
//! - **Contrastive divergence**: [`GibbsChain`] runs CD-k alternations
//!
//! ## RNG Key System
//!
//! Deterministic RNG key management (similar to JAX):
//!
//! ```rust
//! use rbm_samplers::{NoiseSource, RngKey};
//!
//! let key = RngKey::new(42);
//! let (init_key, chain_key) = key.split_two();
//! let mut noise = NoiseSource::new(chain_key);
//! # let _ = (init_key, &mut noise);
//! ```

pub mod bernoulli;
pub mod gibbs;
pub mod rng;
pub mod sampler;

pub use bernoulli::*;
pub use gibbs::*;
pub use rng::*;
pub use sampler::*;
