//! Parameter persistence.

use std::fs::File;
use std::path::PathBuf;

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use rbm_core::error::{RbmError, Result};
use rbm_samplers::BipartiteConditional;
use serde::{Deserialize, Serialize};

use crate::rbm::{Rbm, RbmConfig};

/// Identifier used when a run does not name its checkpoint.
pub const DEFAULT_CHECKPOINT_ID: &str = "trained_rbm";

/// Metadata saved alongside each checkpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckpointMeta {
    pub n_visible: usize,
    pub n_hidden: usize,
    pub k: usize,
    pub epochs_trained: usize,
    pub last_mean_loss: Option<f32>,
}

impl CheckpointMeta {
    pub fn for_model<B: Backend>(
        model: &Rbm<B>,
        epochs_trained: usize,
        last_mean_loss: Option<f32>,
    ) -> Self {
        Self {
            n_visible: model.n_visible(),
            n_hidden: model.n_hidden(),
            k: model.cd_steps(),
            epochs_trained,
            last_mean_loss,
        }
    }

    /// Shape of the saved model.
    pub fn rbm_config(&self) -> RbmConfig {
        RbmConfig::new(self.n_visible, self.n_hidden).with_k(self.k)
    }
}

/// Saves and restores model parameters by identifier.
pub trait CheckpointStore {
    /// Persist `model` under `id`, returning the path of the parameter file.
    fn save<B: Backend>(&self, model: &Rbm<B>, id: &str, meta: &CheckpointMeta) -> Result<PathBuf>;

    /// Load parameters saved under `id` into a model shaped by `config`.
    fn load<B: Backend>(&self, id: &str, config: &RbmConfig, device: &B::Device) -> Result<Rbm<B>>;

    fn load_meta(&self, id: &str) -> Result<Option<CheckpointMeta>>;
}

/// [`CheckpointStore`] backed by burn's named MessagePack recorder.
///
/// Layout inside `dir`:
/// - `<id>.mpk`: parameter map (`weights`, `visible_bias`, `hidden_bias`)
/// - `<id>.meta.json`: [`CheckpointMeta`]
#[derive(Debug, Clone)]
pub struct RecorderCheckpointStore {
    dir: PathBuf,
}

impl RecorderCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path handed to the recorder, which appends its own extension.
    fn stem(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    pub fn parameter_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.mpk"))
    }

    pub fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.meta.json"))
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }
}

impl CheckpointStore for RecorderCheckpointStore {
    fn save<B: Backend>(&self, model: &Rbm<B>, id: &str, meta: &CheckpointMeta) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RbmError::io(&self.dir, e))?;

        let path = self.parameter_path(id);
        model
            .clone()
            .save_file(self.stem(id), &Self::recorder())
            .map_err(|e| RbmError::Checkpoint {
                path: path.clone(),
                message: format!("failed to save parameters: {e}"),
            })?;

        let meta_path = self.meta_path(id);
        let file = File::create(&meta_path).map_err(|e| RbmError::io(&meta_path, e))?;
        serde_json::to_writer_pretty(file, meta).map_err(|e| RbmError::Checkpoint {
            path: meta_path.clone(),
            message: format!("failed to write metadata: {e}"),
        })?;

        tracing::info!(
            path = %path.display(),
            epochs_trained = meta.epochs_trained,
            "Checkpoint saved"
        );
        Ok(path)
    }

    fn load<B: Backend>(&self, id: &str, config: &RbmConfig, device: &B::Device) -> Result<Rbm<B>> {
        let path = self.parameter_path(id);
        if !path.exists() {
            return Err(RbmError::Checkpoint {
                path,
                message: "no such checkpoint".to_string(),
            });
        }
        if let Some(meta) = self.load_meta(id)? {
            let saved = [meta.n_hidden, meta.n_visible];
            let requested = [config.n_hidden, config.n_visible];
            if saved != requested {
                return Err(RbmError::shape("checkpoint shape", &requested, &saved));
            }
        }

        let model = config
            .init_zeros::<B>(device)?
            .load_file(self.stem(id), &Self::recorder(), device)
            .map_err(|e| RbmError::Checkpoint {
                path: path.clone(),
                message: format!("failed to load parameters: {e}"),
            })?;

        // the recorder restores tensors as stored, whatever their shape
        let expected = [config.n_hidden, config.n_visible];
        let actual = model.weights.val().dims();
        if actual != expected {
            return Err(RbmError::shape("checkpoint weights", &expected, &actual));
        }
        let visible = model.visible_bias.val().dims();
        if visible != [config.n_visible] {
            return Err(RbmError::shape("checkpoint visible_bias", &[config.n_visible], &visible));
        }
        let hidden = model.hidden_bias.val().dims();
        if hidden != [config.n_hidden] {
            return Err(RbmError::shape("checkpoint hidden_bias", &[config.n_hidden], &hidden));
        }

        tracing::info!(
            path = %path.display(),
            n_visible = model.n_visible(),
            n_hidden = model.n_hidden(),
            "Checkpoint loaded"
        );
        Ok(model)
    }

    fn load_meta(&self, id: &str) -> Result<Option<CheckpointMeta>> {
        let meta_path = self.meta_path(id);
        if !meta_path.exists() {
            return Ok(None);
        }
        let file = File::open(&meta_path).map_err(|e| RbmError::io(&meta_path, e))?;
        let meta = serde_json::from_reader(file).map_err(|e| RbmError::Checkpoint {
            path: meta_path.clone(),
            message: format!("failed to parse metadata: {e}"),
        })?;
        Ok(Some(meta))
    }
}
