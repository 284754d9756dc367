//! Device-resident sample pools.

use crate::sampling::SamplePool;
use crate::util::Result;

use super::device::{BufferKind, ComputeDevice};

/// Square and disk pool buffers for the current sample root.
pub struct PoolBuffers<B> {
    square: B,
    disk: B,
    sample_root: u32,
    num_sets: u32,
}

impl<B> PoolBuffers<B> {
    /// Upload both pools into freshly allocated buffers.
    pub fn upload<D>(device: &mut D, pool: &SamplePool) -> Result<Self>
    where
        D: ComputeDevice<Buffer = B>,
    {
        let square = device.create_buffer("t2_square_samples", BufferKind::Storage, pool.square_bytes())?;
        let disk = match device.create_buffer("t2_disk_samples", BufferKind::Storage, pool.disk_bytes()) {
            Ok(disk) => disk,
            Err(err) => {
                device.release_buffer(square);
                return Err(err);
            }
        };
        Ok(Self {
            square,
            disk,
            sample_root: pool.sample_root(),
            num_sets: pool.num_sets() as u32,
        })
    }

    /// Swap in buffers for `pool`.
    ///
    /// The new buffers are allocated first; the old ones are released only
    /// once that succeeded, so an allocation failure leaves `self` intact.
    pub fn replace<D>(&mut self, device: &mut D, pool: &SamplePool) -> Result<()>
    where
        D: ComputeDevice<Buffer = B>,
    {
        let fresh = Self::upload(device, pool)?;
        let old = std::mem::replace(self, fresh);
        old.release(device);
        Ok(())
    }

    pub fn release<D>(self, device: &mut D)
    where
        D: ComputeDevice<Buffer = B>,
    {
        device.release_buffer(self.square);
        device.release_buffer(self.disk);
    }

    pub fn square(&self) -> &B {
        &self.square
    }

    pub fn disk(&self) -> &B {
        &self.disk
    }

    pub fn sample_root(&self) -> u32 {
        self.sample_root
    }

    pub fn num_sets(&self) -> u32 {
        self.num_sets
    }
}
