//! In-place Fisher–Yates shuffle.

use rand::Rng;

/// Shuffle `buffer` in place with an unbiased Fisher–Yates pass.
///
/// Works for any element type, so the same routine reorders plain index
/// arrays and `[f32; 2]` sample pairs. `gen_range` rejects out-of-range
/// draws instead of reducing modulo `i + 1`, so every permutation is equally
/// likely.
pub fn shuffle<T, R: Rng + ?Sized>(buffer: &mut [T], rng: &mut R) {
    for i in (1..buffer.len()).rev() {
        let j = rng.gen_range(0..=i);
        buffer.swap(i, j);
    }
}
