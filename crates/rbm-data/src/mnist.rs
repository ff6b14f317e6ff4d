//! MNIST images in IDX format.
//!
//! Layout: big-endian `u32` magic `2051`, image count, rows, columns, then
//! one unsigned byte per pixel in row-major order. Pixels are scaled to
//! `[0, 1]` by dividing by 255.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::Array2;
use rbm_core::dataset::InMemoryDataset;
use rbm_core::error::{RbmError, Result};

pub const IDX_IMAGES_MAGIC: u32 = 2051;

/// Standard file name of the training images.
pub const MNIST_TRAIN_IMAGES: &str = "train-images-idx3-ubyte";

/// Side length of an MNIST digit.
pub const MNIST_SIDE: usize = 28;

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| RbmError::InvalidData(format!("IDX header ({what}): {e}")))?;
    Ok(u32::from_be_bytes(buf))
}

/// Parse IDX image data from a reader.
///
/// Returns the dataset and the image side lengths `(rows, cols)`.
pub fn read_idx_images<R: Read>(mut reader: R) -> Result<(InMemoryDataset, (usize, usize))> {
    let magic = read_u32(&mut reader, "magic")?;
    if magic != IDX_IMAGES_MAGIC {
        return Err(RbmError::InvalidData(format!(
            "IDX magic {magic}, expected {IDX_IMAGES_MAGIC}"
        )));
    }
    let count = read_u32(&mut reader, "count")? as usize;
    let rows = read_u32(&mut reader, "rows")? as usize;
    let cols = read_u32(&mut reader, "cols")? as usize;
    if count == 0 || rows == 0 || cols == 0 {
        return Err(RbmError::InvalidData(format!(
            "IDX file declares {count} images of {rows}x{cols}"
        )));
    }

    let total = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| {
            RbmError::InvalidData(format!(
                "IDX file declares {count} images of {rows}x{cols}, too many pixels"
            ))
        })?;

    let mut pixels = Vec::new();
    reader
        .take(total as u64)
        .read_to_end(&mut pixels)
        .map_err(|e| RbmError::InvalidData(format!("IDX pixel data: {e}")))?;
    if pixels.len() != total {
        return Err(RbmError::InvalidData(format!(
            "IDX pixel data truncated: {} of {total} bytes",
            pixels.len()
        )));
    }

    let values: Vec<f32> = pixels.into_iter().map(|p| p as f32 / 255.0).collect();
    let samples = Array2::from_shape_vec((count, rows * cols), values)
        .map_err(|e| RbmError::InvalidData(format!("IDX layout: {e}")))?;
    Ok((InMemoryDataset::new(samples)?, (rows, cols)))
}

/// Load IDX images from `path`.
pub fn load_idx_images(path: impl AsRef<Path>) -> Result<InMemoryDataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| RbmError::io(path, e))?;
    let (dataset, (rows, cols)) = read_idx_images(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        images = dataset.samples().nrows(),
        rows,
        cols,
        "Loaded IDX images"
    );
    Ok(dataset)
}

/// Load the MNIST training images from `dir`.
pub fn load_mnist_train(dir: impl AsRef<Path>) -> Result<InMemoryDataset> {
    load_idx_images(dir.as_ref().join(MNIST_TRAIN_IMAGES))
}
