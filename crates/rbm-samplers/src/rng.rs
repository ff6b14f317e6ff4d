//! Explicit random streams.
//!
//! Keys are `u64` seeds split deterministically with ChaCha8 (JAX-style), and a
//! [`NoiseSource`] owns one ChaCha8 stream that every sampling call draws
//! fresh noise from. Nothing in the RBM crates touches a global RNG.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rbm_core::error::{RbmError, Result};

/// An RNG key for deterministic random number generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngKey(pub u64);

impl RngKey {
    pub fn new(seed: u64) -> Self {
        RngKey(seed)
    }

    /// Split this key into `n` independent keys.
    pub fn split(self, n: usize) -> Vec<RngKey> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![self];
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        (0..n).map(|_| RngKey(rng.next_u64())).collect()
    }

    /// Split into a fixed number of keys; matches the first `N` of [`split`](Self::split).
    pub fn split_n<const N: usize>(self) -> [RngKey; N] {
        if N == 1 {
            return [self; N];
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        std::array::from_fn(|_| RngKey(rng.next_u64()))
    }

    /// Split into exactly two keys (common case).
    pub fn split_two(self) -> (RngKey, RngKey) {
        let [a, b] = self.split_n();
        (a, b)
    }

    pub fn seed(&self) -> u64 {
        self.0
    }
}

/// A stream of uniform and Gaussian noise, uploaded to the device on demand.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: ChaCha8Rng,
}

impl NoiseSource {
    pub fn new(key: RngKey) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(key.seed()),
        }
    }

    /// Fresh i.i.d. `U[0, 1)` values of the given shape.
    pub fn uniform<B: Backend, const D: usize>(
        &mut self,
        shape: [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        let n: usize = shape.iter().product();
        let values: Vec<f32> = (0..n).map(|_| self.rng.gen::<f32>()).collect();
        Tensor::from_data(TensorData::new(values, shape), device)
    }

    /// Fresh i.i.d. `N(0, std²)` values of the given shape.
    pub fn normal<B: Backend, const D: usize>(
        &mut self,
        shape: [usize; D],
        std: f64,
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        let dist = Normal::new(0.0f32, std as f32)
            .map_err(|e| RbmError::InvalidConfig(format!("normal std {std}: {e}")))?;
        let n: usize = shape.iter().product();
        let values: Vec<f32> = (0..n).map(|_| dist.sample(&mut self.rng)).collect();
        Ok(Tensor::from_data(TensorData::new(values, shape), device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbm_core::backend::{init_cpu_device, CpuBackend};

    #[test]
    fn test_rng_key_split() {
        let key = RngKey::new(42);
        let keys = key.split(5);

        assert_eq!(keys.len(), 5);
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i].0, keys[j].0, "Keys should be unique");
            }
        }
    }

    #[test]
    fn test_fixed_split_matches_split() {
        let key = RngKey::new(9);
        let fixed: [RngKey; 3] = key.split_n();
        assert_eq!(fixed.to_vec(), key.split(3));
        assert_eq!(key.split_two(), (key.split(2)[0], key.split(2)[1]));
    }

    #[test]
    fn test_rng_key_deterministic() {
        let keys1 = RngKey::new(42).split(10);
        let keys2 = RngKey::new(42).split(10);
        assert_eq!(keys1, keys2);
    }

    #[test]
    fn test_uniform_range_and_freshness() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(7));

        let a: Vec<f32> = noise
            .uniform::<CpuBackend, 2>([16, 8], &device)
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = noise
            .uniform::<CpuBackend, 2>([16, 8], &device)
            .into_data()
            .to_vec()
            .unwrap();

        assert!(a.iter().all(|&u| (0.0..1.0).contains(&u)));
        assert_ne!(a, b, "consecutive draws must not repeat");
    }

    #[test]
    fn test_same_key_same_noise() {
        let device = init_cpu_device();
        let a: Vec<f32> = NoiseSource::new(RngKey::new(3))
            .uniform::<CpuBackend, 1>([32], &device)
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = NoiseSource::new(RngKey::new(3))
            .uniform::<CpuBackend, 1>([32], &device)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normal_scale() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(11));
        let values: Vec<f32> = noise
            .normal::<CpuBackend, 2>([100, 100], 0.01, &device)
            .unwrap()
            .into_data()
            .to_vec()
            .unwrap();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 1e-3, "mean {mean}");
        assert!((var.sqrt() - 0.01).abs() < 1e-3, "std {}", var.sqrt());
    }

    #[test]
    fn test_normal_rejects_negative_std() {
        let device = init_cpu_device();
        let mut noise = NoiseSource::new(RngKey::new(1));
        assert!(noise.normal::<CpuBackend, 1>([4], -1.0, &device).is_err());
    }
}
