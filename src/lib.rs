//! # t2
//!
//! Progressive sampling and accumulation engine for an interactive compute
//! renderer. Each pixel converges to the average of `sample_root²` jittered
//! samples, accumulated a batch at a time into a pair of float images so the
//! display shows a usable image from the first batch on.
//!
//! ## Modules
//!
//! - [`sampling`] - Jittered sample sets, disk mapping, shuffling, sample pools
//! - [`render`] - Session, accumulation buffers, parameter sync, refinement
//! - [`backend`] - CPU reference device and the wgpu device
//! - [`config`] - Configuration and log levels
//! - [`cli`] - Command-line parsing
//! - [`export`] - Writing converged images to disk
//! - [`util`] - Errors and vector helpers
//!
//! ## Example
//!
//! ```ignore
//! use t2::prelude::*;
//!
//! let device = CpuDevice::new(PreviewKernel);
//! let mut session = Session::new(device, Configuration::default())?;
//! session.run_to_convergence(usize::MAX)?;
//! let pixels = session.read_display()?;
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod export;
pub mod render;
pub mod sampling;
pub mod util;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{ConstantKernel, CpuDevice, Kernel, PreviewKernel, SampleContext};
    #[cfg(feature = "gpu")]
    pub use crate::backend::WgpuDevice;
    pub use crate::config::{Configuration, LogLevel};
    pub use crate::render::{Command, ComputeDevice, Control, FrameView, Presenter, Session, State, TickOutcome};
    pub use crate::sampling::SamplePool;
    pub use crate::util::{Error, Result};
}
