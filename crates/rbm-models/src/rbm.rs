//! Bernoulli-Bernoulli restricted Boltzmann machine.
//!
//! Energy of a joint configuration:
//!
//! ```text
//! E(v, h) = -b·v - c·h - hᵀ W v
//! ```
//!
//! with `W: [n_hidden, n_visible]`, visible bias `b: [n_visible]` and hidden
//! bias `c: [n_hidden]`. The conditionals factorize:
//!
//! ```text
//! P(h_j = 1 | v) = σ((v Wᵀ + c)_j)
//! P(v_i = 1 | h) = σ((h W + b)_i)
//! ```
//!
//! and the free energy is `F(v) = -b·v - Σ_j softplus((v Wᵀ + c)_j)`.

use burn::module::Param;
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use ndarray::Array2;
use rbm_core::backend::{scalar_value, tensor_to_array2};
use rbm_core::error::{RbmError, Result as RbmResult};
use rbm_samplers::{bernoulli, BipartiteConditional, GibbsChain, LayerSample, NoiseSource};

use crate::ebm::{softplus, FreeEnergy};

/// Shape and initialization of an [`Rbm`].
#[derive(Config, Debug)]
pub struct RbmConfig {
    pub n_visible: usize,
    pub n_hidden: usize,
    /// Gibbs alternations per contrastive-divergence step.
    #[config(default = 2)]
    pub k: usize,
    /// Standard deviation of the initial Gaussian weights.
    #[config(default = 0.01)]
    pub init_std: f64,
}

impl RbmConfig {
    pub fn validate(&self) -> RbmResult<()> {
        if self.n_visible == 0 || self.n_hidden == 0 {
            return Err(RbmError::InvalidConfig(format!(
                "layer sizes must be positive, got n_visible={} n_hidden={}",
                self.n_visible, self.n_hidden
            )));
        }
        if self.k == 0 {
            return Err(RbmError::InvalidConfig(
                "contrastive divergence needs k >= 1".to_string(),
            ));
        }
        if !(self.init_std.is_finite() && self.init_std > 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "init_std must be positive and finite, got {}",
                self.init_std
            )));
        }
        Ok(())
    }

    /// Gaussian weights `N(0, init_std²)` drawn from `noise`, zero biases.
    pub fn init<B: Backend>(&self, device: &B::Device, noise: &mut NoiseSource) -> RbmResult<Rbm<B>> {
        self.validate()?;
        let weights = noise.normal::<B, 2>([self.n_hidden, self.n_visible], self.init_std, device)?;
        tracing::debug!(
            n_visible = self.n_visible,
            n_hidden = self.n_hidden,
            k = self.k,
            init_std = self.init_std,
            "Initialized RBM"
        );
        Ok(Rbm::from_parts(
            weights,
            Tensor::zeros([self.n_visible], device),
            Tensor::zeros([self.n_hidden], device),
            self.k,
        ))
    }

    /// All-zero parameters; also the template checkpoints are loaded into.
    pub fn init_zeros<B: Backend>(&self, device: &B::Device) -> RbmResult<Rbm<B>> {
        self.validate()?;
        Ok(Rbm::from_parts(
            Tensor::zeros([self.n_hidden, self.n_visible], device),
            Tensor::zeros([self.n_visible], device),
            Tensor::zeros([self.n_hidden], device),
            self.k,
        ))
    }
}

/// Restricted Boltzmann machine parameters.
///
/// Layer sizes are fixed at construction; every operation rejects inputs whose
/// trailing dimension disagrees with them.
#[derive(Module, Debug)]
pub struct Rbm<B: Backend> {
    /// Coupling matrix `[n_hidden, n_visible]`.
    pub weights: Param<Tensor<B, 2>>,
    pub visible_bias: Param<Tensor<B, 1>>,
    pub hidden_bias: Param<Tensor<B, 1>>,
    k: usize,
}

/// Gradients of the contrastive loss with respect to each parameter.
#[derive(Debug, Clone)]
pub struct RbmGradients<B: Backend> {
    pub weights: Tensor<B, 2>,
    pub visible_bias: Tensor<B, 1>,
    pub hidden_bias: Tensor<B, 1>,
}

impl<B: Backend> Rbm<B> {
    /// Build from explicit tensors, checking that their shapes agree.
    pub fn from_tensors(
        weights: Tensor<B, 2>,
        visible_bias: Tensor<B, 1>,
        hidden_bias: Tensor<B, 1>,
        k: usize,
    ) -> RbmResult<Self> {
        let [n_hidden, n_visible] = weights.dims();
        if visible_bias.dims() != [n_visible] {
            return Err(RbmError::shape("visible_bias", &[n_visible], &visible_bias.dims()));
        }
        if hidden_bias.dims() != [n_hidden] {
            return Err(RbmError::shape("hidden_bias", &[n_hidden], &hidden_bias.dims()));
        }
        GibbsChain::with_k(k)?;
        Ok(Self::from_parts(weights, visible_bias, hidden_bias, k))
    }

    fn from_parts(
        weights: Tensor<B, 2>,
        visible_bias: Tensor<B, 1>,
        hidden_bias: Tensor<B, 1>,
        k: usize,
    ) -> Self {
        Self {
            weights: Param::from_tensor(weights),
            visible_bias: Param::from_tensor(visible_bias),
            hidden_bias: Param::from_tensor(hidden_bias),
            k,
        }
    }

    pub fn cd_steps(&self) -> usize {
        self.k
    }

    /// Gibbs chain running this model's `k` alternations.
    pub fn chain(&self) -> RbmResult<GibbsChain> {
        GibbsChain::with_k(self.k)
    }

    fn check_width(&self, context: &'static str, input: &Tensor<B, 2>, width: usize) -> RbmResult<()> {
        let [batch, actual] = input.dims();
        if actual != width {
            return Err(RbmError::shape(context, &[batch, width], &[batch, actual]));
        }
        Ok(())
    }

    /// Hidden pre-activation `v Wᵀ + c`, `[batch, n_hidden]`.
    fn hidden_activation(&self, visible: Tensor<B, 2>) -> Tensor<B, 2> {
        visible.matmul(self.weights.val().transpose()) + self.hidden_bias.val().unsqueeze_dim::<2>(0)
    }

    /// `P(h = 1 | v)` for a `[batch, n_visible]` input.
    pub fn hidden_probability(&self, visible: Tensor<B, 2>) -> RbmResult<Tensor<B, 2>> {
        self.check_width("hidden_probability", &visible, self.n_visible())?;
        Ok(sigmoid(self.hidden_activation(visible)))
    }

    /// `P(v = 1 | h)` for a `[batch, n_hidden]` input.
    pub fn visible_probability(&self, hidden: Tensor<B, 2>) -> RbmResult<Tensor<B, 2>> {
        self.check_width("visible_probability", &hidden, self.n_hidden())?;
        let activation = hidden.matmul(self.weights.val()) + self.visible_bias.val().unsqueeze_dim::<2>(0);
        Ok(sigmoid(activation))
    }

    /// Analytic gradient of `F(data) - F(model)`.
    ///
    /// ```text
    /// ∂/∂W   = ⟨σ(a) vᵀ⟩_model - ⟨σ(a) vᵀ⟩_data
    /// ∂/∂b   = ⟨v⟩_model - ⟨v⟩_data
    /// ∂/∂c   = ⟨σ(a)⟩_model - ⟨σ(a)⟩_data
    /// ```
    ///
    /// where `a = v Wᵀ + c` and `⟨·⟩` averages over the batch.
    pub fn contrastive_gradients(
        &self,
        data_visible: Tensor<B, 2>,
        model_visible: Tensor<B, 2>,
    ) -> RbmResult<RbmGradients<B>> {
        let (n_visible, n_hidden) = (self.n_visible(), self.n_hidden());
        let n_data = data_visible.dims()[0] as f64;
        let n_model = model_visible.dims()[0] as f64;

        let h_data = self.hidden_probability(data_visible.clone())?;
        let h_model = self.hidden_probability(model_visible.clone())?;

        let weights = h_model
            .clone()
            .transpose()
            .matmul(model_visible.clone())
            .div_scalar(n_model)
            - h_data.clone().transpose().matmul(data_visible.clone()).div_scalar(n_data);
        let visible_bias = (model_visible.mean_dim(0) - data_visible.mean_dim(0)).reshape([n_visible]);
        let hidden_bias = (h_model.mean_dim(0) - h_data.mean_dim(0)).reshape([n_hidden]);

        Ok(RbmGradients {
            weights,
            visible_bias,
            hidden_bias,
        })
    }

    /// Mean squared error between `visible` and its one-alternation reconstruction
    /// probability.
    pub fn reconstruction_error(&self, visible: Tensor<B, 2>, noise: &mut NoiseSource) -> RbmResult<f32> {
        let state = GibbsChain::alternate(self, visible.clone(), noise)?;
        let error = (state.visible.probability - visible).powf_scalar(2.0).mean();
        scalar_value(error)
    }

    /// Host copy of the weight matrix.
    pub fn weights_array(&self) -> RbmResult<Array2<f32>> {
        tensor_to_array2(self.weights.val())
    }

    /// First non-finite parameter value, if any.
    pub fn first_non_finite(&self) -> RbmResult<Option<f32>> {
        let n_visible = self.n_visible();
        let n_hidden = self.n_hidden();
        let tensors = [
            self.weights.val().reshape([n_hidden * n_visible]),
            self.visible_bias.val(),
            self.hidden_bias.val(),
        ];
        for tensor in tensors {
            let values: Vec<f32> = tensor
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| RbmError::InvalidData(format!("failed to read parameters: {e:?}")))?;
            if let Some(bad) = values.into_iter().find(|v| !v.is_finite()) {
                return Ok(Some(bad));
            }
        }
        Ok(None)
    }
}

impl<B: Backend> FreeEnergy<B> for Rbm<B> {
    fn free_energy_per_sample(&self, visible: Tensor<B, 2>) -> RbmResult<Tensor<B, 1>> {
        self.check_width("free_energy", &visible, self.n_visible())?;
        let [batch, _] = visible.dims();

        let bias_term = (visible.clone() * self.visible_bias.val().unsqueeze_dim::<2>(0)).sum_dim(1);
        let hidden_term = softplus(self.hidden_activation(visible)).sum_dim(1);

        Ok((hidden_term.neg() - bias_term).reshape([batch]))
    }
}

impl<B: Backend> BipartiteConditional<B> for Rbm<B> {
    fn n_visible(&self) -> usize {
        self.weights.val().dims()[1]
    }

    fn n_hidden(&self) -> usize {
        self.weights.val().dims()[0]
    }

    fn hidden_from_visible(
        &self,
        visible: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> RbmResult<LayerSample<B>> {
        let probability = self.hidden_probability(visible)?;
        let sample = bernoulli(probability.clone(), noise)?;
        Ok(LayerSample {
            sample,
            probability,
        })
    }

    fn visible_from_hidden(
        &self,
        hidden: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> RbmResult<LayerSample<B>> {
        let probability = self.visible_probability(hidden)?;
        let sample = bernoulli(probability.clone(), noise)?;
        Ok(LayerSample {
            sample,
            probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbm_core::backend::{init_cpu_device, CpuBackend};
    use rbm_samplers::RngKey;

    type B = CpuBackend;

    fn values<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    fn zero_model(n_visible: usize, n_hidden: usize) -> Rbm<B> {
        RbmConfig::new(n_visible, n_hidden)
            .init_zeros::<B>(&init_cpu_device())
            .unwrap()
    }

    #[test]
    fn test_init_shapes_and_biases() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(0));
        let model = RbmConfig::new(784, 500).init::<B>(&device, &mut noise).unwrap();

        assert_eq!(model.weights.val().dims(), [500, 784]);
        assert_eq!(model.n_visible(), 784);
        assert_eq!(model.n_hidden(), 500);
        assert_eq!(model.cd_steps(), 2);
        assert!(values(model.visible_bias.val()).iter().all(|&v| v == 0.0));
        assert!(values(model.hidden_bias.val()).iter().all(|&v| v == 0.0));

        let w = values(model.weights.val());
        let mean = w.iter().sum::<f32>() / w.len() as f32;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / w.len() as f32;
        assert!(mean.abs() < 1e-3, "weight mean {mean}");
        assert!((var.sqrt() - 0.01).abs() < 1e-3, "weight std {}", var.sqrt());
    }

    #[test]
    fn test_config_rejects_degenerate_shapes() {
        let device = init_cpu_device();
        assert!(RbmConfig::new(0, 4).init_zeros::<B>(&device).is_err());
        assert!(RbmConfig::new(4, 4).with_k(0).init_zeros::<B>(&device).is_err());
        assert!(RbmConfig::new(4, 4)
            .with_init_std(-1.0)
            .init_zeros::<B>(&device)
            .is_err());
    }

    #[test]
    fn test_zero_parameters_give_half_probabilities() {
        let device = init_cpu_device();
        let model = zero_model(4, 3);
        let visible = Tensor::<B, 2>::from_data([[1.0f32, 0.0, 1.0, 1.0]], &device);

        let hidden = model.hidden_probability(visible).unwrap();
        assert_eq!(hidden.dims(), [1, 3]);
        assert!(values(hidden).iter().all(|&p| (p - 0.5).abs() < 1e-7));

        let hidden_state = Tensor::<B, 2>::ones([2, 3], &device);
        let visible = model.visible_probability(hidden_state).unwrap();
        assert_eq!(visible.dims(), [2, 4]);
        assert!(values(visible).iter().all(|&p| (p - 0.5).abs() < 1e-7));
    }

    #[test]
    fn test_zero_parameters_free_energy() {
        let device = init_cpu_device();
        let model = zero_model(4, 3);
        let visible = Tensor::<B, 2>::from_data(
            [[1.0f32, 0.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0]],
            &device,
        );

        let per_sample = values(model.free_energy_per_sample(visible).unwrap());
        let expected = -3.0 * std::f32::consts::LN_2;
        assert_eq!(per_sample.len(), 2);
        for f in per_sample {
            assert!((f - expected).abs() < 1e-6, "F = {f}, expected {expected}");
        }
    }

    #[test]
    fn test_free_energy_matches_hand_computation() {
        let device = init_cpu_device();
        let model = Rbm::<B>::from_tensors(
            Tensor::from_data([[0.5f32, -1.0], [2.0, 0.25]], &device),
            Tensor::from_data([0.1f32, -0.2].as_slice(), &device),
            Tensor::from_data([0.3f32, -0.4].as_slice(), &device),
            1,
        )
        .unwrap();
        let visible = Tensor::<B, 2>::from_data([[1.0f32, 1.0]], &device);

        let f = values(model.free_energy(visible).unwrap())[0];

        let sp = |x: f32| (1.0 + x.exp()).ln();
        let a0 = 0.5 - 1.0 + 0.3;
        let a1 = 2.0 + 0.25 - 0.4;
        let expected = -(0.1 - 0.2) - sp(a0) - sp(a1);
        assert!((f - expected).abs() < 1e-5, "F = {f}, expected {expected}");
    }

    #[test]
    fn test_free_energy_independent_of_batch_order() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(11));
        let model = RbmConfig::new(4, 3)
            .with_init_std(0.5)
            .init::<B>(&device, &mut noise)
            .unwrap();

        let rows = [[1.0f32, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 0.0], [1.0, 1.0, 1.0, 0.0]];
        let forward = Tensor::<B, 2>::from_data(rows, &device);
        let reversed = Tensor::<B, 2>::from_data([rows[2], rows[1], rows[0]], &device);

        let f_forward = values(model.free_energy_per_sample(forward.clone()).unwrap());
        let mut f_reversed = values(model.free_energy_per_sample(reversed.clone()).unwrap());
        f_reversed.reverse();
        for (a, b) in f_forward.iter().zip(&f_reversed) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }

        let mean_forward = values(model.free_energy(forward).unwrap())[0];
        let mean_reversed = values(model.free_energy(reversed).unwrap())[0];
        assert!((mean_forward - mean_reversed).abs() < 1e-6);

        // one example alone or repeated in a batch
        let single = values(model.free_energy(Tensor::from_data([rows[0]], &device)).unwrap())[0];
        let repeated = Tensor::<B, 2>::from_data([rows[0], rows[0], rows[0]], &device);
        for f in values(model.free_energy_per_sample(repeated).unwrap()) {
            assert!((f - single).abs() < 1e-6);
        }
    }

    #[test]
    fn test_alternation_keeps_visible_shape() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(12));
        let model = RbmConfig::new(7, 5).init::<B>(&device, &mut noise).unwrap();
        let visible = Tensor::<B, 2>::ones([3, 7], &device);

        let hidden = model.hidden_from_visible(visible, &mut noise).unwrap();
        assert_eq!(hidden.sample.dims(), [3, 5]);
        assert_eq!(hidden.probability.dims(), [3, 5]);

        let back = model.visible_from_hidden(hidden.sample, &mut noise).unwrap();
        assert_eq!(back.sample.dims(), [3, 7]);
        assert_eq!(back.probability.dims(), [3, 7]);
    }

    #[test]
    fn test_free_energy_finite_for_huge_activations() {
        let device = init_cpu_device();
        let model = Rbm::<B>::from_tensors(
            Tensor::full([2, 3], 500.0, &device),
            Tensor::zeros([3], &device),
            Tensor::zeros([2], &device),
            1,
        )
        .unwrap();
        let visible = Tensor::<B, 2>::ones([1, 3], &device);

        let f = values(model.free_energy(visible).unwrap())[0];
        assert!(f.is_finite());
        assert!((f + 3000.0).abs() < 1e-2);
    }

    #[test]
    fn test_probabilities_deterministic_samples_vary() {
        let device = init_cpu_device();
        let mut init_noise = NoiseSource::new(RngKey::new(3));
        let model = RbmConfig::new(6, 5)
            .with_init_std(1.0)
            .init::<B>(&device, &mut init_noise)
            .unwrap();
        let visible = Tensor::<B, 2>::from_data([[1.0f32, 0.0, 1.0, 0.0, 1.0, 1.0]; 16], &device);

        let mut noise = NoiseSource::new(RngKey::new(11));
        let first = model.hidden_from_visible(visible.clone(), &mut noise).unwrap();
        let second = model.hidden_from_visible(visible, &mut noise).unwrap();

        assert_eq!(values(first.probability), values(second.probability));
        assert_ne!(values(first.sample.clone()), values(second.sample));
        assert!(values(first.sample).iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_conditionals_reject_wrong_width() {
        let device = init_cpu_device();
        let model = zero_model(4, 3);
        let mut noise = NoiseSource::new(RngKey::new(0));

        let err = model
            .hidden_from_visible(Tensor::zeros([2, 5], &device), &mut noise)
            .unwrap_err();
        assert!(matches!(err, RbmError::ShapeMismatch { .. }));

        let err = model
            .visible_from_hidden(Tensor::zeros([2, 4], &device), &mut noise)
            .unwrap_err();
        assert!(matches!(err, RbmError::ShapeMismatch { .. }));

        assert!(model.free_energy(Tensor::zeros([2, 3], &device)).is_err());
    }

    #[test]
    fn test_from_tensors_rejects_bias_mismatch() {
        let device = init_cpu_device();
        let err = Rbm::<B>::from_tensors(
            Tensor::zeros([3, 4], &device),
            Tensor::zeros([3], &device),
            Tensor::zeros([3], &device),
            1,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RbmError::ShapeMismatch {
                context: "visible_bias",
                ..
            }
        ));
    }

    #[test]
    fn test_contrastive_gradients_vanish_for_identical_batches() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(5));
        let model = RbmConfig::new(5, 3)
            .with_init_std(0.5)
            .init::<B>(&device, &mut noise)
            .unwrap();
        let batch = Tensor::<B, 2>::from_data(
            [[1.0f32, 0.0, 1.0, 1.0, 0.0], [0.0, 1.0, 0.0, 1.0, 1.0]],
            &device,
        );

        let grads = model.contrastive_gradients(batch.clone(), batch).unwrap();
        assert_eq!(grads.weights.dims(), [3, 5]);
        assert!(values(grads.weights).iter().all(|v| v.abs() < 1e-7));
        assert!(values(grads.visible_bias).iter().all(|v| v.abs() < 1e-7));
        assert!(values(grads.hidden_bias).iter().all(|v| v.abs() < 1e-7));
    }

    #[test]
    fn test_first_non_finite() {
        let device = init_cpu_device();
        let model = zero_model(2, 2);
        assert_eq!(model.first_non_finite().unwrap(), None);

        let broken = Rbm::<B>::from_tensors(
            Tensor::from_data([[0.0f32, f32::INFINITY], [0.0, 0.0]], &device),
            Tensor::zeros([2], &device),
            Tensor::zeros([2], &device),
            1,
        )
        .unwrap();
        assert_eq!(broken.first_non_finite().unwrap(), Some(f32::INFINITY));
    }
}
