//! Contrastive-divergence Gibbs chain.
//!
//! One *alternation* samples the hidden layer from the current visible sample,
//! then reconstructs the visible layer from the hidden **probabilities** (not the
//! binary hidden sample), which keeps reconstruction noise low. CD-k runs
//! exactly `k` alternations starting from the data; there is no early exit and
//! no divergence detection inside the chain.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rbm_core::error::{RbmError, Result};
use serde::{Deserialize, Serialize};

use crate::rng::NoiseSource;
use crate::sampler::{BipartiteConditional, LayerSample};

/// Number of Gibbs alternations per training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CdSchedule {
    pub k: usize,
}

impl CdSchedule {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(RbmError::InvalidConfig(
                "contrastive divergence needs k >= 1".to_string(),
            ));
        }
        Ok(Self { k })
    }
}

/// State after one full visible → hidden → visible alternation.
#[derive(Debug, Clone)]
pub struct GibbsState<B: Backend> {
    pub hidden: LayerSample<B>,
    pub visible: LayerSample<B>,
}

/// Result of a CD-k run.
#[derive(Debug, Clone)]
pub struct CdOutput<B: Backend> {
    /// Hidden layer sampled from the initial (data) visible configuration.
    pub data_hidden: LayerSample<B>,
    /// Chain state after the last alternation.
    pub last: GibbsState<B>,
    pub steps: usize,
}

impl<B: Backend> CdOutput<B> {
    /// Binary visible sample at the end of the chain.
    pub fn model_visible(&self) -> Tensor<B, 2> {
        self.last.visible.sample.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GibbsChain {
    schedule: CdSchedule,
}

impl GibbsChain {
    pub fn new(schedule: CdSchedule) -> Self {
        Self { schedule }
    }

    pub fn with_k(k: usize) -> Result<Self> {
        Ok(Self::new(CdSchedule::new(k)?))
    }

    pub fn k(&self) -> usize {
        self.schedule.k
    }

    /// One alternation: `h ~ p(h|v)`, then `v' ~ p(v|P(h|v))`.
    pub fn alternate<B: Backend, M: BipartiteConditional<B>>(
        model: &M,
        visible: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> Result<GibbsState<B>> {
        let hidden = model.hidden_from_visible(visible, noise)?;
        let visible = model.visible_from_hidden(hidden.probability.clone(), noise)?;
        Ok(GibbsState { hidden, visible })
    }

    /// Run `k` alternations from `visible`.
    pub fn run<B: Backend, M: BipartiteConditional<B>>(
        &self,
        model: &M,
        visible: Tensor<B, 2>,
        noise: &mut NoiseSource,
    ) -> Result<CdOutput<B>> {
        let mut state = Self::alternate(model, visible, noise)?;
        let data_hidden = state.hidden.clone();

        for _ in 1..self.schedule.k {
            state = Self::alternate(model, state.visible.sample.clone(), noise)?;
        }

        Ok(CdOutput {
            data_hidden,
            last: state,
            steps: self.schedule.k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bernoulli::bernoulli;
    use crate::rng::RngKey;
    use burn::tensor::activation::sigmoid;
    use rbm_core::backend::{init_cpu_device, CpuBackend};
    use std::cell::Cell;

    type B = CpuBackend;

    /// Toy layer pair with a fixed bias per unit and no coupling.
    /// Counts calls so the number of alternations can be asserted.
    struct Biased {
        visible_logit: f32,
        hidden_logit: f32,
        n_visible: usize,
        n_hidden: usize,
        calls: Cell<usize>,
    }

    impl BipartiteConditional<B> for Biased {
        fn n_visible(&self) -> usize {
            self.n_visible
        }

        fn n_hidden(&self) -> usize {
            self.n_hidden
        }

        fn hidden_from_visible(
            &self,
            visible: Tensor<B, 2>,
            noise: &mut NoiseSource,
        ) -> Result<LayerSample<B>> {
            self.calls.set(self.calls.get() + 1);
            let [batch, _] = visible.dims();
            let probability = sigmoid(Tensor::<B, 2>::full(
                [batch, self.n_hidden],
                self.hidden_logit,
                &visible.device(),
            ));
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
        ) -> Result<LayerSample<B>> {
            self.calls.set(self.calls.get() + 1);
            let [batch, _] = hidden.dims();
            let probability = sigmoid(Tensor::<B, 2>::full(
                [batch, self.n_visible],
                self.visible_logit,
                &hidden.device(),
            ));
            let sample = bernoulli(probability.clone(), noise)?;
            Ok(LayerSample {
                sample,
                probability,
            })
        }
    }

    fn biased(visible_logit: f32, hidden_logit: f32) -> Biased {
        Biased {
            visible_logit,
            hidden_logit,
            n_visible: 6,
            n_hidden: 3,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(
            GibbsChain::with_k(0),
            Err(RbmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_runs_exactly_k_alternations() {
        let device = init_cpu_device();
        let model = biased(0.0, 0.0);
        let mut noise = NoiseSource::new(RngKey::new(1));
        let v0 = Tensor::<B, 2>::zeros([4, 6], &device);

        let out = GibbsChain::with_k(3).unwrap().run(&model, v0, &mut noise).unwrap();

        assert_eq!(out.steps, 3);
        assert_eq!(model.calls.get(), 6);
        assert_eq!(out.model_visible().dims(), [4, 6]);
        assert_eq!(out.data_hidden.sample.dims(), [4, 3]);
    }

    #[test]
    fn test_deterministic_field_k1() {
        // Saturated logits make every probability round to exactly 0 or 1 in f32,
        // so the single alternation is fully determined.
        let device = init_cpu_device();
        let model = biased(-100.0, 100.0);
        let mut noise = NoiseSource::new(RngKey::new(2));
        let v0 = Tensor::<B, 2>::ones([2, 6], &device);

        let out = GibbsChain::with_k(1).unwrap().run(&model, v0, &mut noise).unwrap();

        let h: Vec<f32> = out.last.hidden.sample.into_data().to_vec().unwrap();
        let v: Vec<f32> = out.last.visible.sample.into_data().to_vec().unwrap();
        assert!(h.iter().all(|&x| x == 1.0));
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(model.calls.get(), 2);
    }

    #[test]
    fn test_reconstruction_uses_hidden_probability() {
        struct Recorder {
            seen: std::cell::RefCell<Vec<Vec<f32>>>,
        }

        impl BipartiteConditional<B> for Recorder {
            fn n_visible(&self) -> usize {
                2
            }
            fn n_hidden(&self) -> usize {
                2
            }
            fn hidden_from_visible(
                &self,
                visible: Tensor<B, 2>,
                _noise: &mut NoiseSource,
            ) -> Result<LayerSample<B>> {
                let device = visible.device();
                Ok(LayerSample {
                    sample: Tensor::ones([1, 2], &device),
                    probability: Tensor::from_data([[0.25f32, 0.75]], &device),
                })
            }
            fn visible_from_hidden(
                &self,
                hidden: Tensor<B, 2>,
                _noise: &mut NoiseSource,
            ) -> Result<LayerSample<B>> {
                let device = hidden.device();
                self.seen
                    .borrow_mut()
                    .push(hidden.into_data().to_vec().unwrap());
                Ok(LayerSample {
                    sample: Tensor::zeros([1, 2], &device),
                    probability: Tensor::zeros([1, 2], &device),
                })
            }
        }

        let device = init_cpu_device();
        let model = Recorder {
            seen: Default::default(),
        };
        let mut noise = NoiseSource::new(RngKey::new(3));
        GibbsChain::with_k(1)
            .unwrap()
            .run(&model, Tensor::<B, 2>::zeros([1, 2], &device), &mut noise)
            .unwrap();

        assert_eq!(model.seen.borrow()[0], vec![0.25, 0.75]);
    }
}
