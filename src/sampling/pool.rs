//! Host-side sample pools handed to the compute kernel.

use rand::Rng;

use crate::util::Result;

use super::{generate, map_to_unit_disk, shuffle, validate_sample_root, Sample, NUM_SAMPLE_SETS};

/// Square and disk sample pools for one sample root.
///
/// Both pools hold [`NUM_SAMPLE_SETS`] sets of `sample_root²` samples. Each
/// set is shuffled after generation so the kernel, which consumes a set in
/// index order as the sample count grows, does not visit the strata in grid
/// order.
#[derive(Debug, Clone)]
pub struct SamplePool {
    sample_root: u32,
    square: Vec<Sample>,
    disk: Vec<Sample>,
}

impl SamplePool {
    /// Generate fresh square and disk pools.
    #[tracing::instrument(skip(rng))]
    pub fn generate<R: Rng + ?Sized>(sample_root: u32, rng: &mut R) -> Result<Self> {
        let per_set = validate_sample_root(sample_root)?;
        let len = per_set * NUM_SAMPLE_SETS;

        let mut square = vec![[0.0; 2]; len];
        let mut disk = vec![[0.0; 2]; len];
        generate(&mut square, sample_root, None, rng)?;
        generate(&mut disk, sample_root, Some(map_to_unit_disk), rng)?;

        for set in square.chunks_exact_mut(per_set) {
            shuffle(set, rng);
        }
        for set in disk.chunks_exact_mut(per_set) {
            shuffle(set, rng);
        }

        tracing::debug!(sample_root, sets = NUM_SAMPLE_SETS, samples = len, "generated sample pools");
        Ok(Self { sample_root, square, disk })
    }

    pub fn sample_root(&self) -> u32 {
        self.sample_root
    }

    /// Samples per set (`sample_root²`).
    pub fn samples_per_set(&self) -> usize {
        (self.sample_root * self.sample_root) as usize
    }

    pub fn num_sets(&self) -> usize {
        self.square.len() / self.samples_per_set()
    }

    /// All square samples, set after set.
    pub fn square(&self) -> &[Sample] {
        &self.square
    }

    /// All disk samples, set after set.
    pub fn disk(&self) -> &[Sample] {
        &self.disk
    }

    /// Square samples as raw bytes for upload.
    pub fn square_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.square)
    }

    /// Disk samples as raw bytes for upload.
    pub fn disk_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.disk)
    }
}
