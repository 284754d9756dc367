//! Read/write accumulation image pair.
//!
//! The kernel cannot read and write one image in the same dispatch, so the
//! running average lives in two images with fixed roles: the kernel reads the
//! average so far from `read` and writes the updated average to `write`.
//! Before each accumulating dispatch [`AccumulationBuffers::settle`] copies
//! `write` into `read`.

use crate::util::Result;

use super::device::ComputeDevice;

pub struct AccumulationBuffers<I> {
    read: I,
    write: I,
    width: u32,
    height: u32,
}

impl<I> AccumulationBuffers<I> {
    pub fn new<D>(device: &mut D, width: u32, height: u32) -> Result<Self>
    where
        D: ComputeDevice<Image = I>,
    {
        let read = device.create_image("t2_accum_read", width, height)?;
        let write = device.create_image("t2_accum_write", width, height)?;
        Ok(Self { read, write, width, height })
    }

    /// Copy the last completed average into the read image.
    ///
    /// Must run exactly once before every accumulating dispatch. A failure
    /// leaves `read` undefined, so callers treat it as fatal for the cycle.
    pub fn settle<D>(&self, device: &mut D) -> Result<()>
    where
        D: ComputeDevice<Image = I>,
    {
        device.copy_image(&self.write, &self.read, self.width, self.height)
    }

    pub fn read(&self) -> &I {
        &self.read
    }

    pub fn write(&self) -> &I {
        &self.write
    }

    /// Image holding the latest accumulated result.
    pub fn display(&self) -> &I {
        &self.write
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
