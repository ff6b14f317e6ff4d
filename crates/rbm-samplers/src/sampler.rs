use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rbm_core::error::Result;

use crate::rng::NoiseSource;

/// A binary sample of one layer together with the probabilities it was drawn from.
#[derive(Debug, Clone)]
pub struct LayerSample<B: Backend> {
    /// Binary states, exactly 0 or 1.
    pub sample: Tensor<B, 2>,
    /// Activation probabilities in (0, 1).
    pub probability: Tensor<B, 2>,
}

/// Conditional sampling for a two-layer bipartite model.
///
/// Implementors expose `p(h | v)` and `p(v | h)` and sample each with noise from
/// the caller's [`NoiseSource`]. Probabilities must be deterministic given the
/// input and the current parameters; only the binary samples depend on noise.
pub trait BipartiteConditional<B: Backend> {
    fn n_visible(&self) -> usize;

    fn n_hidden(&self) -> usize;

    /// Sample the hidden layer given a `[batch, n_visible]` visible configuration.
    fn hidden_from_visible(
        &self,
        visible: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> Result<LayerSample<B>>;

    /// Sample the visible layer given a `[batch, n_hidden]` hidden configuration.
    fn visible_from_hidden(
        &self,
        hidden: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> Result<LayerSample<B>>;
}
