/// Free-energy abstractions.
///
/// The free energy of a visible configuration marginalizes the hidden layer
/// out of the joint energy, `p(v) ∝ exp(-F(v))`. Only differences of free
/// energies are meaningful; the absolute value is never a probability.
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rbm_core::error::Result;

/// Above this input, `log(1 + exp(x))` equals `x` to f32 precision.
pub const SOFTPLUS_LINEAR_THRESHOLD: f32 = 20.0;

/// Numerically stable `log(1 + exp(x))`.
///
/// Inputs above [`SOFTPLUS_LINEAR_THRESHOLD`] pass through linearly, and `exp`
/// never sees an argument above the threshold, so large activations cannot
/// overflow. The result is differentiable everywhere with derivative
/// `sigmoid(x)` below the threshold and 1 above it.
pub fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let linear = x.clone().greater_elem(SOFTPLUS_LINEAR_THRESHOLD);
    let curved = x
        .clone()
        .clamp_max(SOFTPLUS_LINEAR_THRESHOLD)
        .exp()
        .log1p();
    curved.mask_where(linear, x)
}

/// Trait for models with a free energy over batched visible configurations.
pub trait FreeEnergy<B: Backend> {
    /// Free energy of each configuration in a `[batch, n_visible]` tensor.
    ///
    /// # Returns
    /// Free energy for each sample `[batch]`
    fn free_energy_per_sample(&self, visible: Tensor<B, 2>) -> Result<Tensor<B, 1>>;

    /// Batch-mean free energy as a single-element tensor.
    fn free_energy(&self, visible: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        Ok(self.free_energy_per_sample(visible)?.mean())
    }

    /// Contrastive-divergence surrogate loss `F(data) - F(model)`.
    fn free_energy_gap(
        &self,
        data_visible: Tensor<B, 2>,
        model_visible: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>> {
        Ok(self.free_energy(data_visible)? - self.free_energy(model_visible)?)
    }
}
