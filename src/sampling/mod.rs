//! Sample generation for progressive accumulation.
//!
//! - [`generate`] - jittered sample sets, optionally remapped
//! - [`generate_random`] - uniform sets without stratification
//! - [`map_to_unit_disk`] - concentric square-to-disk mapping for lens samples
//! - [`shuffle`] - Fisher–Yates shuffle over any element type
//! - [`SamplePool`] - the square and disk pools the kernel consumes

mod disk;
mod jitter;
mod pool;
mod shuffle;

pub use disk::map_to_unit_disk;
pub use jitter::{generate, generate_random, generate_random_set, generate_set, Mapper};
pub use pool::SamplePool;
pub use shuffle::shuffle;

use crate::util::{Error, Result};

/// One 2D sample coordinate.
pub type Sample = [f32; 2];

/// Largest supported sample root (`32² = 1024` samples per pixel).
pub const MAX_SAMPLE_ROOT: u32 = 32;

/// Number of independent sets in each pool.
pub const NUM_SAMPLE_SETS: usize = 64;

/// Check `sample_root` is in `1..=MAX_SAMPLE_ROOT` and return `sample_root²`.
pub fn validate_sample_root(sample_root: u32) -> Result<usize> {
    if (1..=MAX_SAMPLE_ROOT).contains(&sample_root) {
        Ok((sample_root * sample_root) as usize)
    } else {
        Err(Error::InvalidSampleRoot(sample_root))
    }
}
