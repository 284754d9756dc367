//! Compute backends.
//!
//! - [`cpu::CpuDevice`] - host reference device, always available
//! - [`gpu::WgpuDevice`] - headless GPU device (feature `gpu`)

pub mod cpu;
mod kernel;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::{ConstantKernel, CpuDevice, Kernel, PreviewKernel, SampleContext, SampleIndexKernel};
#[cfg(feature = "gpu")]
pub use gpu::WgpuDevice;
