//! Where a training run reads its data set and writes its results.
//!
//! Each directory is taken from the first source that names it:
//! 1. `--data-dir` / `--output-dir` (or `RBM_DATA_DIR` / `RBM_OUTPUT_DIR`)
//! 2. the same keys in the TOML path file (`--config-file`, default
//!    `<platform config dir>/rbm/config.toml`)
//! 3. `<base>/data` and `<base>/output`, where `base` comes from `--base-dir`,
//!    `RBM_BASE_DIR` or the path file
//! 4. the platform data directory
//!
//! ```toml
//! base_dir = "/Volumes/External/rbm"
//! output_dir = "/tmp/rbm-runs"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::{RbmError, Result};

const PROJECT_NAME: &str = "rbm";

/// Path flags, meant to be flattened into a binary's own parser.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Directory holding the training sets
    #[arg(long, env = "RBM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for checkpoints, loss timelines, weight dumps and images
    #[arg(long, env = "RBM_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Parent of `data/` and `output/` when those are not set directly
    #[arg(long, env = "RBM_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// TOML file with `data_dir`, `output_dir` and `base_dir` keys
    #[arg(long, env = "RBM_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct PathFile {
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl PathFile {
    /// Missing files are silent; unreadable or malformed ones are logged and ignored.
    fn read(explicit: Option<&Path>) -> Self {
        let location = explicit.map(Path::to_path_buf).or_else(|| {
            ProjectDirs::from("", "", PROJECT_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
        });
        let Some(path) = location.filter(|p| p.exists()) else {
            return Self::default();
        };

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| toml::from_str::<PathFile>(&text).map_err(|e| e.to_string()));
        parsed.unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "Ignoring path file: {e}");
            Self::default()
        })
    }
}

/// Resolved data and output directories.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    data_dir: PathBuf,
    output_dir: PathBuf,
}

impl PathConfig {
    pub fn from_path_args(args: PathArgs) -> Self {
        let file = PathFile::read(args.config_file.as_deref());
        let base = args.base_dir.or(file.base_dir);
        let under_base = |leaf: &str| base.as_ref().map(|b| b.join(leaf));

        let data_dir = args
            .data_dir
            .or(file.data_dir)
            .or_else(|| under_base("data"))
            .unwrap_or_else(|| platform_dir("data"));
        let output_dir = args
            .output_dir
            .or(file.output_dir)
            .or_else(|| under_base("output"))
            .unwrap_or_else(|| platform_dir("output"));

        Self {
            data_dir,
            output_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.output_dir] {
            fs::create_dir_all(dir).map_err(|e| RbmError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!(
            data = %self.data_dir.display(),
            output = %self.output_dir.display(),
            "Path configuration"
        );
    }
}

fn platform_dir(leaf: &str) -> PathBuf {
    match ProjectDirs::from("", "", PROJECT_NAME) {
        Some(dirs) => dirs.data_dir().join(leaf),
        None => PathBuf::from(leaf),
    }
}
