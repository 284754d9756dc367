//! Progressive accumulation engine.
//!
//! A [`Session`] owns the device, the two accumulation images, the sample
//! pool buffers and both parameter blocks. Each [`Session::tick`] applies
//! pending commands and dispatches at most one batch of samples.

mod accum;
mod device;
mod input;
mod params;
mod pools;
mod present;
mod refine;
mod session;
mod state;
mod timing;

pub use accum::AccumulationBuffers;
pub use device::{BufferKind, ComputeDevice, KernelArgs};
pub use input::{Command, Control, HeldInputs};
pub use params::{DeviceParams, Param, Synced};
pub use pools::PoolBuffers;
pub use present::{status_line, FrameView, Presenter};
pub use refine::{Batch, BatchThrottle, Phase, Progress, Refinement};
pub use session::{Session, TickOutcome};
pub use state::{DeviceLayout, GpuConfig, GpuState, State, CAMERA_START, FRAME_TIME_UNMEASURED};
pub use timing::FrameTimer;
