//! Backend abstraction - Multi-backend support
//!
//! Supports Wgpu (GPU) and NdArray (CPU) backends, selected at compile time.

use burn::backend::Autodiff;

// --------------------------------------------------------------------------------
// BACKEND SELECTION: Wgpu (preferred) or NdArray (fallback)
// --------------------------------------------------------------------------------

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(all(not(feature = "wgpu"), feature = "ndarray"))]
pub type DefaultBackend = burn::backend::NdArray;

#[cfg(all(not(feature = "wgpu"), not(feature = "ndarray")))]
compile_error!("At least one backend (wgpu or ndarray) must be enabled!");

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Device type of the inference backend
pub type DefaultDevice = <DefaultBackend as burn::tensor::backend::Backend>::Device;

/// Get the default device
pub fn default_device() -> DefaultDevice {
    DefaultDevice::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "wgpu")]
    {
        "Wgpu (GPU)"
    }

    #[cfg(all(not(feature = "wgpu"), feature = "ndarray"))]
    {
        "NdArray (CPU)"
    }
}
