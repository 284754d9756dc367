//! Lazy host → device synchronization of the parameter blocks.
//!
//! The host copy is authoritative. Mutations go through [`Synced::update`],
//! which raises the dirty flag; [`Synced::flush_if_dirty`] uploads the whole
//! structure once and lowers it. Frames that change nothing cost no transfer.

use crate::config::Configuration;
use crate::util::Result;

use super::device::{BufferKind, ComputeDevice};
use super::state::{DeviceLayout, State};

/// A host value mirrored into a device buffer.
pub struct Synced<T: DeviceLayout, B> {
    host: T,
    buffer: B,
    dirty: bool,
    label: &'static str,
}

impl<T: DeviceLayout, B> Synced<T, B> {
    /// Allocate the device buffer. Starts dirty, so the first flush uploads.
    pub fn new<D>(device: &mut D, label: &'static str, host: T) -> Result<Self>
    where
        D: ComputeDevice<Buffer = B>,
    {
        let zeroed = <T::Gpu as bytemuck::Zeroable>::zeroed();
        let buffer = device.create_buffer(label, BufferKind::Uniform, bytemuck::bytes_of(&zeroed))?;
        Ok(Self { host, buffer, dirty: true, label })
    }

    pub fn get(&self) -> &T {
        &self.host
    }

    /// Mutate the host copy and mark it dirty.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        self.dirty = true;
        f(&mut self.host)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Upload the host copy if it changed since the last flush.
    ///
    /// Returns whether a transfer happened. On failure the flag stays set.
    pub fn flush_if_dirty<D>(&mut self, device: &mut D) -> Result<bool>
    where
        D: ComputeDevice<Buffer = B>,
    {
        if !self.dirty {
            return Ok(false);
        }
        let gpu = self.host.to_gpu();
        device.write_buffer(&self.buffer, bytemuck::bytes_of(&gpu))?;
        self.dirty = false;
        tracing::trace!(buffer = self.label, "uploaded parameters");
        Ok(true)
    }

    /// Release the device buffer.
    pub fn release<D>(self, device: &mut D)
    where
        D: ComputeDevice<Buffer = B>,
    {
        device.release_buffer(self.buffer);
    }
}

/// Selects one of the two parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Configuration,
    State,
}

/// Configuration and State, each with its device buffer and dirty flag.
pub struct DeviceParams<D: ComputeDevice> {
    pub config: Synced<Configuration, D::Buffer>,
    pub state: Synced<State, D::Buffer>,
}

impl<D: ComputeDevice> DeviceParams<D> {
    pub fn new(device: &mut D, config: Configuration, state: State) -> Result<Self> {
        Ok(Self {
            config: Synced::new(device, "t2_configuration", config)?,
            state: Synced::new(device, "t2_state", state)?,
        })
    }

    pub fn mark_dirty(&mut self, which: Param) {
        match which {
            Param::Configuration => self.config.mark_dirty(),
            Param::State => self.state.mark_dirty(),
        }
    }

    pub fn is_dirty(&self, which: Param) -> bool {
        match which {
            Param::Configuration => self.config.is_dirty(),
            Param::State => self.state.is_dirty(),
        }
    }

    pub fn flush_if_dirty(&mut self, device: &mut D, which: Param) -> Result<bool> {
        match which {
            Param::Configuration => self.config.flush_if_dirty(device),
            Param::State => self.state.flush_if_dirty(device),
        }
    }

    /// Flush both blocks; returns how many transfers happened.
    pub fn flush_all(&mut self, device: &mut D) -> Result<usize> {
        let config = self.flush_if_dirty(device, Param::Configuration)?;
        let state = self.flush_if_dirty(device, Param::State)?;
        Ok(config as usize + state as usize)
    }
}
