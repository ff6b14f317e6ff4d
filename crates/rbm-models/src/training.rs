//! Contrastive-divergence training loop.
//!
//! Each mini-batch is binarized, pushed through a CD-k Gibbs chain on the
//! non-tracking copy of the model, and scored with the surrogate loss
//! `F(data) - F(model sample)`. Only the two free-energy evaluations carry
//! gradient: the binarized input and the chain output enter as constants.
//! Gradients are consumed by an SGD optimizer with momentum, dampening and
//! weight decay.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use burn::module::{AutodiffModule, Param};
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;
use rbm_core::backend::{array2_to_tensor, scalar_value, tensor_to_array2};
use rbm_core::dataset::DataSource;
use rbm_core::error::{RbmError, Result as RbmResult};
use rbm_observers::{BatchRecord, EpochSnapshot, TrainingObserver, TrainingSummary};
use rbm_samplers::{bernoulli, BipartiteConditional, CdOutput, GibbsChain, NoiseSource, RngKey};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointMeta, CheckpointStore};
use crate::ebm::FreeEnergy;
use crate::rbm::{Rbm, RbmGradients};

/// How parameter gradients of the surrogate loss are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientEstimator {
    /// Reverse-mode differentiation of `F(data) - F(model)`.
    #[default]
    Autodiff,
    /// The analytic CD gradient from [`Rbm::contrastive_gradients`].
    ClosedForm,
}

impl fmt::Display for GradientEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradientEstimator::Autodiff => write!(f, "autodiff"),
            GradientEstimator::ClosedForm => write!(f, "closed-form"),
        }
    }
}

impl FromStr for GradientEstimator {
    type Err = RbmError;

    fn from_str(s: &str) -> RbmResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "autodiff" => Ok(GradientEstimator::Autodiff),
            "closed-form" | "closed_form" | "closedform" => Ok(GradientEstimator::ClosedForm),
            other => Err(RbmError::InvalidConfig(format!(
                "unknown gradient estimator '{other}' (expected autodiff or closed-form)"
            ))),
        }
    }
}

/// Hyperparameters of a training run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 10)]
    pub epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 0.01)]
    pub learning_rate: f64,
    /// SGD momentum factor; 0 disables momentum.
    #[config(default = 0.1)]
    pub momentum: f64,
    #[config(default = 0.0)]
    pub dampening: f64,
    /// L2 penalty added to every gradient.
    #[config(default = 0.1)]
    pub weight_decay: f64,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = "GradientEstimator::Autodiff")]
    pub gradient: GradientEstimator,
    /// Skip a trailing batch smaller than `batch_size`.
    #[config(default = false)]
    pub drop_last: bool,
}

impl TrainingConfig {
    pub fn validate(&self) -> RbmResult<()> {
        if self.epochs == 0 {
            return Err(RbmError::InvalidConfig("epochs must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(RbmError::InvalidConfig("batch_size must be >= 1".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.momentum.is_finite() && self.momentum >= 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "momentum must be non-negative, got {}",
                self.momentum
            )));
        }
        if !(0.0..=1.0).contains(&self.dampening) {
            return Err(RbmError::InvalidConfig(format!(
                "dampening must lie in [0, 1], got {}",
                self.dampening
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(RbmError::InvalidConfig(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }

    /// Optimizer settings; zero momentum or decay leaves that term out.
    pub fn sgd(&self) -> SgdConfig {
        let momentum = (self.momentum > 0.0).then(|| MomentumConfig {
            momentum: self.momentum as _,
            dampening: self.dampening as _,
            nesterov: false,
        });
        let weight_decay = (self.weight_decay > 0.0).then(|| WeightDecayConfig {
            penalty: self.weight_decay as _,
        });
        SgdConfig::new()
            .with_momentum(momentum)
            .with_weight_decay(weight_decay)
    }
}

/// Independent noise streams derived from one seed.
#[derive(Debug, Clone)]
pub struct NoiseStreams {
    /// Weight initialization.
    pub init: NoiseSource,
    /// Binarization of real-valued input.
    pub binarize: NoiseSource,
    /// Gibbs chain sampling.
    pub chain: NoiseSource,
}

impl NoiseStreams {
    pub fn from_seed(seed: u64) -> Self {
        let [init, binarize, chain] = RngKey::new(seed).split_n();
        Self {
            init: NoiseSource::new(init),
            binarize: NoiseSource::new(binarize),
            chain: NoiseSource::new(chain),
        }
    }
}

/// Trained parameters and per-epoch losses.
#[derive(Debug)]
pub struct TrainingOutcome<B: Backend> {
    pub model: Rbm<B>,
    pub summary: TrainingSummary,
}

impl<B: Backend> TrainingOutcome<B> {
    /// Persist the trained parameters, counting `epochs_before` earlier epochs.
    pub fn save<S: CheckpointStore>(&self, store: &S, id: &str, epochs_before: usize) -> RbmResult<PathBuf> {
        let meta = CheckpointMeta::for_model(
            &self.model,
            epochs_before + self.summary.epochs,
            self.summary.epoch_losses.last().copied(),
        );
        store.save(&self.model, id, &meta)
    }
}

/// Tensors kept from one step for the epoch snapshot.
struct StepOutput<B: Backend> {
    loss: f32,
    data: Tensor<B, 2>,
    chain: CdOutput<B>,
}

/// Gradient of `param` copied into its own buffer; zero when the loss does not reach it.
///
/// The optimizer keeps the registered tensor as momentum state, so it must not
/// share storage with the backward pass.
fn owned_gradient<B: AutodiffBackend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    backward: &B::Gradients,
) -> Tensor<B::InnerBackend, D> {
    match param.val().grad(backward) {
        Some(grad) => {
            let device = grad.device();
            Tensor::from_data(grad.into_data(), &device)
        }
        None => param.val().inner().zeros_like(),
    }
}

/// Run one CD-k step and apply the optimizer.
fn cd_step<B, O>(
    model: Rbm<B>,
    optimizer: &mut O,
    chain: &GibbsChain,
    batch: &Array2<f32>,
    config: &TrainingConfig,
    noise: &mut NoiseStreams,
    position: (usize, usize),
) -> RbmResult<(Rbm<B>, StepOutput<B::InnerBackend>)>
where
    B: AutodiffBackend,
    O: Optimizer<Rbm<B>, B>,
{
    let (epoch, batch_index) = position;
    let inner = model.valid();
    let device = inner.weights.val().device();

    let raw = array2_to_tensor::<B::InnerBackend>(batch, &device);
    let data = bernoulli(raw, &mut noise.binarize)?;
    let cd = chain.run(&inner, data.clone(), &mut noise.chain)?;
    let model_visible = cd.model_visible();

    let ensure_finite = |value: f32| -> RbmResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(RbmError::NumericalInstability {
                quantity: "loss",
                epoch,
                batch: batch_index,
                value,
            })
        }
    };

    let (loss, gradients) = match config.gradient {
        GradientEstimator::Autodiff => {
            let loss = model.free_energy_gap(
                Tensor::from_inner(data.clone()),
                Tensor::from_inner(model_visible),
            )?;
            let value = scalar_value(loss.clone().inner())?;
            ensure_finite(value)?;
            let backward = loss.backward();
            let gradients = RbmGradients {
                weights: owned_gradient(&model.weights, &backward),
                visible_bias: owned_gradient(&model.visible_bias, &backward),
                hidden_bias: owned_gradient(&model.hidden_bias, &backward),
            };
            (value, gradients)
        }
        GradientEstimator::ClosedForm => {
            let value = scalar_value(inner.free_energy_gap(data.clone(), model_visible.clone())?)?;
            ensure_finite(value)?;
            (value, inner.contrastive_gradients(data.clone(), model_visible)?)
        }
    };

    let mut grads = GradientsParams::new();
    grads.register(model.weights.id, gradients.weights);
    grads.register(model.visible_bias.id, gradients.visible_bias);
    grads.register(model.hidden_bias.id, gradients.hidden_bias);

    let model = optimizer.step(config.learning_rate, model, grads);
    Ok((
        model,
        StepOutput {
            loss,
            data,
            chain: cd,
        },
    ))
}

fn snapshot<B: Backend>(
    epoch: usize,
    mean_loss: f32,
    model: &Rbm<B>,
    last: StepOutput<B>,
) -> RbmResult<EpochSnapshot> {
    let reconstruction_error = scalar_value(
        (last.chain.last.visible.probability.clone() - last.data.clone())
            .powf_scalar(2.0)
            .mean(),
    )?;
    Ok(EpochSnapshot {
        epoch,
        mean_loss,
        reconstruction_error,
        input: tensor_to_array2(last.data)?,
        reconstruction: tensor_to_array2(last.chain.model_visible())?,
        weights: model.weights_array()?,
        hidden: tensor_to_array2(last.chain.data_hidden.sample)?,
    })
}

/// Train `model` on `data` with CD-k.
///
/// # Arguments
/// - `model`: initial parameters (consumed and returned updated)
/// - `data`: mini-batch source; its width must equal the model's visible size
/// - `config`: optimizer and loop settings
/// - `noise`: binarization and chain noise are drawn from here
/// - `observer`: receives every batch loss and an epoch snapshot
///
/// # Errors
/// A NaN or infinite loss aborts the run before the optimizer step, and a
/// non-finite parameter aborts it at the end of the epoch; both report
/// [`RbmError::NumericalInstability`].
pub fn train<B, D, O>(
    model: Rbm<B>,
    data: &D,
    config: &TrainingConfig,
    noise: &mut NoiseStreams,
    observer: &mut O,
) -> RbmResult<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    D: DataSource + ?Sized,
    O: TrainingObserver + ?Sized,
{
    config.validate()?;
    if data.n_visible() != model.n_visible() {
        return Err(RbmError::shape(
            "training data",
            &[model.n_visible()],
            &[data.n_visible()],
        ));
    }
    if data.is_empty() || (config.drop_last && data.len() < config.batch_size) {
        return Err(RbmError::InvalidConfig(format!(
            "{} samples yield no batch of size {}",
            data.len(),
            config.batch_size
        )));
    }

    let trailing = data.len() % config.batch_size;
    if trailing != 0 {
        tracing::warn!(
            trailing,
            batch_size = config.batch_size,
            dropped = config.drop_last,
            "Dataset does not divide into whole batches"
        );
    }

    let chain = model.chain()?;
    let mut optimizer = config.sgd().init::<B, Rbm<B>>();
    let mut model = model;
    let mut summary = TrainingSummary::default();

    tracing::info!(
        epochs = config.epochs,
        batch_size = config.batch_size,
        samples = data.len(),
        n_visible = model.n_visible(),
        n_hidden = model.n_hidden(),
        k = chain.k(),
        lr = config.learning_rate,
        gradient = %config.gradient,
        "Starting RBM training"
    );
    let train_start = Instant::now();

    for epoch in 0..config.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;
        let mut last = None;

        for (batch_index, batch) in data
            .batches(config.batch_size, config.drop_last)
            .enumerate()
        {
            let batch = batch?;
            let (next, step) = cd_step(
                model,
                &mut optimizer,
                &chain,
                &batch,
                config,
                noise,
                (epoch, batch_index),
            )?;
            model = next;

            let record = BatchRecord {
                epoch,
                batch: batch_index,
                batch_size: batch.nrows(),
                loss: step.loss,
            };
            tracing::debug!(epoch, batch = batch_index, loss = step.loss, "Batch");
            observer.on_batch(&record)?;

            loss_sum += step.loss as f64;
            batches += 1;
            last = Some(step);
        }

        let Some(last) = last else {
            return Err(RbmError::InvalidData(format!(
                "epoch {epoch} produced no batches"
            )));
        };

        let inner = model.valid();
        if let Some(value) = inner.first_non_finite()? {
            return Err(RbmError::NumericalInstability {
                quantity: "parameter",
                epoch,
                batch: batches - 1,
                value,
            });
        }

        let mean_loss = (loss_sum / batches as f64) as f32;
        let snapshot = snapshot(epoch, mean_loss, &inner, last)?;
        tracing::info!(
            epoch,
            mean_loss,
            reconstruction_error = snapshot.reconstruction_error,
            elapsed_s = train_start.elapsed().as_secs_f64(),
            "Epoch finished"
        );
        observer.on_epoch(&snapshot)?;

        summary.epochs += 1;
        summary.batches += batches;
        summary.epoch_losses.push(mean_loss);
    }

    observer.on_finish(&summary)?;
    tracing::info!(
        epochs = summary.epochs,
        batches = summary.batches,
        elapsed_s = train_start.elapsed().as_secs_f64(),
        "Training complete"
    );

    Ok(TrainingOutcome { model, summary })
}

/// [`train`], then persist the final parameters under `id`.
pub fn train_and_checkpoint<B, D, O, S>(
    model: Rbm<B>,
    data: &D,
    config: &TrainingConfig,
    noise: &mut NoiseStreams,
    observer: &mut O,
    store: &S,
    id: &str,
) -> RbmResult<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    D: DataSource + ?Sized,
    O: TrainingObserver + ?Sized,
    S: CheckpointStore,
{
    let epochs_before = store.load_meta(id)?.map_or(0, |m| m.epochs_trained);
    let outcome = train(model, data, config, noise, observer)?;
    outcome.save(store, id, epochs_before)?;
    Ok(outcome)
}
