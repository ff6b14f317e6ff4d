//! Lattice configurations stored as comma-separated text.
//!
//! The first line is a header and is skipped. Every other non-empty line holds
//! comma-separated numbers; the concatenated values are cut into states of
//! `size * size` sites, so a file may store one state per line or spread a
//! state over several lines.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;
use rbm_core::dataset::InMemoryDataset;
use rbm_core::error::{RbmError, Result};

/// Default file name of a lattice training set.
pub const DEFAULT_LATTICE_FILE: &str = "state0.data";

/// How site values map onto visible units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatticeEncoding {
    /// Values are already occupation numbers in `[0, 1]`.
    #[default]
    Binary,
    /// Values are spins `±1`, mapped to `(s + 1) / 2`.
    Spin,
}

impl LatticeEncoding {
    fn encode(self, value: f32, line: usize) -> Result<f32> {
        match self {
            LatticeEncoding::Binary => Ok(value),
            LatticeEncoding::Spin => {
                if value == 1.0 || value == -1.0 {
                    Ok((value + 1.0) / 2.0)
                } else {
                    Err(RbmError::InvalidData(format!(
                        "line {line}: spin value must be +1 or -1, got {value}"
                    )))
                }
            }
        }
    }
}

/// Parse lattice states of side `size` from a reader.
pub fn read_lattice_csv<R: BufRead>(
    reader: R,
    size: usize,
    encoding: LatticeEncoding,
) -> Result<InMemoryDataset> {
    if size == 0 {
        return Err(RbmError::InvalidConfig("lattice size must be >= 1".to_string()));
    }
    let sites = size * size;

    let mut values = Vec::new();
    for (index, line) in reader.lines().enumerate().skip(1) {
        let line = line.map_err(|e| RbmError::InvalidData(format!("line {}: {e}", index + 1)))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for field in line.split(',') {
            let value: f32 = field.trim().parse().map_err(|e| {
                RbmError::InvalidData(format!("line {}: bad value '{field}': {e}", index + 1))
            })?;
            values.push(encoding.encode(value, index + 1)?);
        }
    }

    if values.is_empty() {
        return Err(RbmError::InvalidData("lattice file holds no states".to_string()));
    }
    if values.len() % sites != 0 {
        return Err(RbmError::InvalidData(format!(
            "{} values do not divide into states of {size}x{size} sites",
            values.len()
        )));
    }

    let n_states = values.len() / sites;
    let samples = Array2::from_shape_vec((n_states, sites), values)
        .map_err(|e| RbmError::InvalidData(format!("lattice layout: {e}")))?;
    InMemoryDataset::new(samples)
}

/// Load lattice states of side `size` from a CSV file.
pub fn load_lattice_csv(
    path: impl AsRef<Path>,
    size: usize,
    encoding: LatticeEncoding,
) -> Result<InMemoryDataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| RbmError::io(path, e))?;
    let dataset = read_lattice_csv(BufReader::new(file), size, encoding)?;
    tracing::info!(
        path = %path.display(),
        states = dataset.samples().nrows(),
        "Loaded training set of {} states",
        dataset.samples().nrows()
    );
    Ok(dataset)
}
