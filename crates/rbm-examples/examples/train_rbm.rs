//! Train a restricted Boltzmann machine with contrastive divergence.
//!
//! Learns either MNIST digits or 2-D Ising lattice configurations. Every epoch
//! appends batch losses to `Loss_timeline.data`, dumps the weight matrix to
//! `W.data<epoch>` and writes image grids of the real input, the generated
//! sample, the weights and the hidden activations. The final parameters are
//! saved as `trained_rbm.mpk` in the output directory.
//!
//! ## Usage
//!
//! ```bash
//! # MNIST (expects <data-dir>/train-images-idx3-ubyte)
//! cargo run --release --example train_rbm -- --model mnist --epochs 10
//!
//! # Ising lattice states (expects <data-dir>/state0.data)
//! cargo run --release --example train_rbm -- --model ising --ising-size 32 --ising-encoding spin
//!
//! # Continue from saved parameters
//! cargo run --release --example train_rbm -- --ckpoint output/trained_rbm.mpk
//!
//! # GPU
//! cargo run --release --features gpu --example train_rbm
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use clap::{Parser, ValueEnum};
use rbm_core::config::{PathArgs, PathConfig};
use rbm_core::dataset::{DataSource, InMemoryDataset};
use rbm_data::{
    load_idx_images, load_lattice_csv, load_npy, LatticeEncoding, DEFAULT_LATTICE_FILE,
    MNIST_TRAIN_IMAGES,
};
use rbm_examples::{ImageGridObserver, ProgressObserver};
use rbm_models::{
    train, CheckpointStore, GradientEstimator, NoiseStreams, Rbm, RbmConfig,
    RecorderCheckpointStore, TrainingConfig, DEFAULT_CHECKPOINT_ID,
};
use rbm_observers::{LossTimelineWriter, ObserverSet, WeightDumpObserver};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    Mnist,
    Ising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SiteEncoding {
    /// Sites stored as 0/1
    Binary,
    /// Sites stored as -1/+1
    Spin,
}

impl From<SiteEncoding> for LatticeEncoding {
    fn from(value: SiteEncoding) -> Self {
        match value {
            SiteEncoding::Binary => LatticeEncoding::Binary,
            SiteEncoding::Spin => LatticeEncoding::Spin,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Train a restricted Boltzmann machine with contrastive divergence"
)]
struct TrainArgs {
    /// Training set
    #[arg(long, value_enum, default_value_t = ModelKind::Mnist)]
    model: ModelKind,

    /// Saved parameters to start from (`<dir>/<id>.mpk`)
    #[arg(long = "ckpoint")]
    checkpoint: Option<PathBuf>,

    /// Number of training epochs
    #[arg(long, short = 'e', default_value = "10", env = "RBM_EPOCHS")]
    epochs: usize,

    /// Mini-batch size
    #[arg(long = "batch", short = 'b', default_value = "128", env = "RBM_BATCH_SIZE")]
    batch_size: usize,

    /// Hidden layer side length (n_hidden = hidden * hidden)
    #[arg(long, default_value = "20")]
    hidden: usize,

    /// Lattice side length of the Ising training set
    #[arg(long = "ising-size", alias = "ising_size", default_value = "32")]
    ising_size: usize,

    /// Gibbs alternations per contrastive-divergence step
    #[arg(long, default_value = "2")]
    k: usize,

    /// Learning rate
    #[arg(long, short = 'l', default_value = "0.01", env = "RBM_LR")]
    lr: f64,

    /// SGD momentum
    #[arg(long, default_value = "0.1")]
    momentum: f64,

    /// L2 weight decay
    #[arg(long, default_value = "0.1")]
    weight_decay: f64,

    /// Random seed
    #[arg(long, short = 's', default_value = "42")]
    seed: u64,

    /// Gradient estimator: autodiff or closed-form
    #[arg(long, default_value = "autodiff")]
    gradient: GradientEstimator,

    /// MNIST IDX image file or 2-D npy array (default: <data-dir>/train-images-idx3-ubyte)
    #[arg(long)]
    mnist_file: Option<PathBuf>,

    /// Ising lattice CSV (default: <data-dir>/state0.data)
    #[arg(long)]
    ising_file: Option<PathBuf>,

    /// How lattice sites are stored
    #[arg(long, value_enum, default_value_t = SiteEncoding::Binary)]
    ising_encoding: SiteEncoding,

    /// Train on the first N samples only (N >= 1)
    #[arg(long)]
    max_samples: Option<NonZeroUsize>,

    /// Identifier of the saved final parameters
    #[arg(long, default_value = DEFAULT_CHECKPOINT_ID)]
    save_as: String,

    /// Skip the per-epoch PNG grids
    #[arg(long)]
    no_images: bool,

    /// Data and output directories
    #[command(flatten)]
    paths: PathArgs,
}

/// Load the training set and return it with the side length of one image.
fn load_dataset(args: &TrainArgs, data_dir: &Path) -> Result<(InMemoryDataset, usize)> {
    match args.model {
        ModelKind::Mnist => {
            let path = args
                .mnist_file
                .clone()
                .unwrap_or_else(|| data_dir.join(MNIST_TRAIN_IMAGES));
            let loaded = if path.extension().is_some_and(|ext| ext == "npy") {
                load_npy(&path)
            } else {
                load_idx_images(&path)
            };
            let dataset =
                loaded.with_context(|| format!("loading MNIST images from {}", path.display()))?;

            let width = dataset.n_visible();
            let side = (width as f64).sqrt().round() as usize;
            if side * side != width {
                bail!("images of {width} pixels are not square");
            }
            Ok((dataset, side))
        }
        ModelKind::Ising => {
            let path = args
                .ising_file
                .clone()
                .unwrap_or_else(|| data_dir.join(DEFAULT_LATTICE_FILE));
            let dataset = load_lattice_csv(&path, args.ising_size, args.ising_encoding.into())
                .with_context(|| format!("loading lattice states from {}", path.display()))?;
            Ok((dataset, args.ising_size))
        }
    }
}

/// Split `<dir>/<id>[.mpk]` into a store and identifier.
fn checkpoint_location(path: &Path) -> Result<(RecorderCheckpointStore, String)> {
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("checkpoint path has no file name")?
        .to_string();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((RecorderCheckpointStore::new(dir), id))
}

fn run<B: AutodiffBackend>(args: &TrainArgs, paths: &PathConfig, device: &B::Device) -> Result<()> {
    let (dataset, visible_side) = load_dataset(args, paths.data_dir())?;
    let dataset = match args.max_samples {
        Some(n) => dataset.truncate(n),
        None => dataset,
    };
    let output = paths.output_dir();

    let rbm_config = RbmConfig::new(dataset.n_visible(), args.hidden * args.hidden).with_k(args.k);
    let training = TrainingConfig::new()
        .with_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.lr)
        .with_momentum(args.momentum)
        .with_weight_decay(args.weight_decay)
        .with_seed(args.seed)
        .with_gradient(args.gradient);
    training.validate()?;
    training
        .save(output.join("training_config.json"))
        .context("saving training configuration")?;

    let mut noise = NoiseStreams::from_seed(args.seed);
    let (model, epochs_before): (Rbm<B>, usize) = match &args.checkpoint {
        Some(path) => {
            let (store, id) = checkpoint_location(path)?;
            tracing::info!(path = %path.display(), "Loading saved network state");
            let epochs_before = store.load_meta(&id)?.map_or(0, |m| m.epochs_trained);
            (store.load::<B>(&id, &rbm_config, device)?, epochs_before)
        }
        None => (rbm_config.init::<B>(device, &mut noise.init)?, 0),
    };

    let mut observers = ObserverSet::new()
        .with(LossTimelineWriter::in_dir(output)?)
        .with(WeightDumpObserver::new(output))
        .with(ProgressObserver::new(args.epochs));
    if !args.no_images {
        observers.push(ImageGridObserver::new(output, visible_side, args.hidden));
    }

    tracing::info!(
        model = ?args.model,
        samples = dataset.len(),
        n_visible = rbm_config.n_visible,
        n_hidden = rbm_config.n_hidden,
        k = rbm_config.k,
        "Training configuration ready"
    );

    let outcome = train(model, &dataset, &training, &mut noise, &mut observers)?;

    let store = RecorderCheckpointStore::new(output);
    let path = outcome.save(&store, &args.save_as, epochs_before)?;
    tracing::info!(
        path = %path.display(),
        final_loss = outcome.summary.epoch_losses.last().copied(),
        "Saved trained network"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = TrainArgs::parse();
    let paths = PathConfig::from_path_args(args.paths.clone());
    paths.log_summary();
    paths.ensure_dirs()?;

    #[cfg(feature = "gpu")]
    {
        use rbm_core::backend::{init_gpu_device, WgpuAutodiffBackend};
        let device = init_gpu_device();
        run::<WgpuAutodiffBackend>(&args, &paths, &device)
    }

    #[cfg(not(feature = "gpu"))]
    {
        use rbm_core::backend::{init_cpu_device, CpuAutodiffBackend};
        let device = init_cpu_device();
        run::<CpuAutodiffBackend>(&args, &paths, &device)
    }
}
