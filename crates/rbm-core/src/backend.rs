use burn::backend::ndarray::NdArrayDevice;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::Array2;

use crate::error::{RbmError, Result};

/// Default CPU backend used for inference and tests.
pub type CpuBackend = burn::backend::NdArray<f32>;

/// CPU backend with reverse-mode differentiation, used by the training loop.
pub type CpuAutodiffBackend = burn::backend::Autodiff<CpuBackend>;

pub fn init_cpu_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

#[cfg(feature = "gpu")]
pub type WgpuBackend = burn::backend::Wgpu;

#[cfg(feature = "gpu")]
pub type WgpuAutodiffBackend = burn::backend::Autodiff<WgpuBackend>;

#[cfg(feature = "gpu")]
pub fn init_gpu_device() -> burn::backend::wgpu::WgpuDevice {
    // Metal is picked automatically on macOS when available
    burn::backend::wgpu::WgpuDevice::default()
}

// Helper to ensure Metal is selected
#[cfg(feature = "gpu")]
pub fn ensure_metal_backend() {
    std::env::set_var("BURN_WGPU_BACKEND", "metal");
}

/// Upload a host matrix to the device as a `[rows, cols]` float tensor.
pub fn array2_to_tensor<B: Backend>(array: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}

/// Download a `[rows, cols]` tensor into a host matrix.
pub fn tensor_to_array2<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array2<f32>> {
    let [rows, cols] = tensor.dims();
    let values: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| RbmError::InvalidData(format!("failed to read tensor: {e:?}")))?;
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| RbmError::InvalidData(format!("tensor layout: {e}")))
}

/// Read a single-element tensor as `f32`.
pub fn scalar_value<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    let values: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| RbmError::InvalidData(format!("failed to read scalar: {e:?}")))?;
    values
        .first()
        .copied()
        .ok_or_else(|| RbmError::InvalidData("empty scalar tensor".to_string()))
}
