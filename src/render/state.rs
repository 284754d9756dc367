//! Per-frame render state and the device layouts of both parameter blocks.

use bytemuck::{Pod, Zeroable};
use std::time::Duration;

use crate::config::Configuration;
use crate::util::{rotate_about_y, Vec3};

/// Camera start position.
pub const CAMERA_START: Vec3 = Vec3::new(0.0, 1.0, -10.0);

/// `last_frame_time` value the kernel sees before a frame has been measured.
pub const FRAME_TIME_UNMEASURED: f32 = -1.0;

/// Mutable per-frame state: camera, lens, progress and overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub position: Vec3,
    /// Unit view direction.
    pub heading: Vec3,
    /// Depth-of-field aperture radius, never negative.
    pub lens_radius: f32,
    /// Samples accumulated so far in the current cycle.
    pub sample_num: u32,
    pub show_overlay: bool,
    /// Wall time of the last converged image, `None` until measured.
    pub last_frame_time: Option<Duration>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            position: CAMERA_START,
            heading: Vec3::Z,
            lens_radius: 0.0,
            sample_num: 0,
            show_overlay: true,
            last_frame_time: None,
        }
    }
}

impl State {
    /// Turn the heading about the up axis. The result is renormalized.
    pub fn rotate_heading(&mut self, angle: f32) {
        self.heading = rotate_about_y(self.heading, angle);
    }

    /// Move relative to the heading: `dz` forward, `dx` to the right.
    /// Movement stays in the ground plane.
    pub fn translate(&mut self, dx: f32, dz: f32) {
        let forward = Vec3::new(self.heading.x, 0.0, self.heading.z);
        let right = Vec3::new(-self.heading.z, 0.0, self.heading.x);
        self.position += forward * dz + right * dx;
    }
}

/// Host structures with a fixed device-side layout.
pub trait DeviceLayout {
    type Gpu: Pod;

    fn to_gpu(&self) -> Self::Gpu;
}

/// Device copy of [`Configuration`] (matches the kernel's `Configuration`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuConfig {
    pub trace_depth: u32,
    pub sample_root: u32,
    pub width: u32,
    pub height: u32,
    pub log_level: u32,
    pub batch_size: u32,
    pub paused: u32,
    pub fullscreen: u32,
}

impl DeviceLayout for Configuration {
    type Gpu = GpuConfig;

    fn to_gpu(&self) -> GpuConfig {
        GpuConfig {
            trace_depth: self.trace_depth,
            sample_root: self.sample_root,
            width: self.width,
            height: self.height,
            log_level: self.log_level as u32,
            batch_size: self.batch_size,
            paused: self.paused as u32,
            fullscreen: self.fullscreen as u32,
        }
    }
}

/// Device copy of [`State`] (matches the kernel's `State`, 16-byte aligned).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuState {
    pub position: [f32; 3],
    pub lens_radius: f32,
    pub heading: [f32; 3],
    pub sample_num: u32,
    pub show_overlay: u32,
    /// Seconds, or [`FRAME_TIME_UNMEASURED`].
    pub last_frame_time: f32,
    pub _pad: [u32; 2],
}

impl DeviceLayout for State {
    type Gpu = GpuState;

    fn to_gpu(&self) -> GpuState {
        GpuState {
            position: self.position.to_array(),
            lens_radius: self.lens_radius,
            heading: self.heading.to_array(),
            sample_num: self.sample_num,
            show_overlay: self.show_overlay as u32,
            last_frame_time: self
                .last_frame_time
                .map_or(FRAME_TIME_UNMEASURED, |t| t.as_secs_f32()),
            _pad: [0; 2],
        }
    }
}
