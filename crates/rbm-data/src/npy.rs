//! Two-dimensional `.npy` arrays as datasets.

use std::fs::File;
use std::path::Path;

use ndarray::Array2;
use ndarray_npy::ReadNpyExt;
use rbm_core::dataset::InMemoryDataset;
use rbm_core::error::{RbmError, Result};

/// Load a `[n_samples, n_visible]` array.
///
/// Accepts `f32`, `f64`, `u8` and `bool` element types. Bytes are read as
/// 8-bit intensities and divided by 255; booleans become 0 or 1. Floating
/// point values must already lie in `[0, 1]`.
pub fn load_npy(path: impl AsRef<Path>) -> Result<InMemoryDataset> {
    let path = path.as_ref();
    let open = || File::open(path).map_err(|e| RbmError::io(path, e));

    let samples = if let Ok(arr) = Array2::<f32>::read_npy(open()?) {
        arr
    } else if let Ok(arr) = Array2::<f64>::read_npy(open()?) {
        arr.mapv(|v| v as f32)
    } else if let Ok(arr) = Array2::<u8>::read_npy(open()?) {
        arr.mapv(|v| v as f32 / 255.0)
    } else {
        match Array2::<bool>::read_npy(open()?) {
            Ok(arr) => arr.mapv(|v| if v { 1.0 } else { 0.0 }),
            Err(e) => {
                return Err(RbmError::InvalidData(format!(
                    "{}: not a 2-D f32/f64/u8/bool array: {e}",
                    path.display()
                )))
            }
        }
    };

    let (rows, cols) = samples.dim();
    tracing::info!(path = %path.display(), rows, cols, "Loaded npy dataset");
    InMemoryDataset::new(samples)
}
