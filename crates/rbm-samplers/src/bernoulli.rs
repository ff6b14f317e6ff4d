use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rbm_core::error::{RbmError, Result};

use crate::rng::NoiseSource;

/// Binarize a probability field against uniform noise.
///
/// Each output element is `1` where `probability > uniform` and `0` otherwise,
/// i.e. one Bernoulli draw per element. The comparison produces a boolean
/// tensor, so the result never carries gradient.
pub fn sample_probability<B: Backend, const D: usize>(
    probability: Tensor<B, D>,
    uniform: Tensor<B, D>,
) -> Result<Tensor<B, D>> {
    let (p_dims, u_dims) = (probability.dims(), uniform.dims());
    if p_dims != u_dims {
        return Err(RbmError::shape("sample_probability", &p_dims, &u_dims));
    }
    Ok(probability.greater(uniform).float())
}

/// Draw one Bernoulli sample per element of `probability` with fresh noise.
pub fn bernoulli<B: Backend, const D: usize>(
    probability: Tensor<B, D>,
    noise: &mut NoiseSource,
) -> Result<Tensor<B, D>> {
    let uniform = noise.uniform::<B, D>(probability.dims(), &probability.device());
    sample_probability(probability, uniform)
}
