//! Error taxonomy shared by every RBM crate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RbmError {
    /// Input or parameter dimensions disagree with the model's fixed shape.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A loss or parameter tensor became NaN or infinite.
    #[error("non-finite {quantity} at epoch {epoch}, batch {batch}: {value}")]
    NumericalInstability {
        quantity: &'static str,
        epoch: usize,
        batch: usize,
        value: f32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, RbmError>;

impl RbmError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RbmError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn shape(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        RbmError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
