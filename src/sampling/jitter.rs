//! Jittered (stratified) and uniform sample set generation.

use rand::Rng;

use crate::util::{Error, Result};

use super::{validate_sample_root, Sample};

/// Optional in-place remapping applied to every generated sample.
pub type Mapper = fn(f32, f32) -> (f32, f32);

/// Largest `f32` strictly below one.
const ONE_MINUS_EPSILON: f32 = f32::from_bits(0x3f7f_ffff);

/// Fill one set with a `sample_root × sample_root` jittered grid.
///
/// Cell `(i, j)` is stored at index `i * sample_root + j` and holds
/// `((i + u) / r, (j + v) / r)` with fresh `u, v ∈ [0, 1)`, passed through
/// `mapper` when one is given.
pub fn generate_set<R: Rng + ?Sized>(
    set: &mut [Sample],
    sample_root: u32,
    mapper: Option<Mapper>,
    rng: &mut R,
) {
    let root = sample_root as usize;
    debug_assert_eq!(set.len(), root * root);

    let inc = 1.0 / sample_root as f32;
    for i in 0..root {
        for j in 0..root {
            let u: f32 = rng.gen();
            let v: f32 = rng.gen();
            // (r - 1 + u) / r can round up to exactly 1.0 in f32
            let mut x = ((i as f32 + u) * inc).min(ONE_MINUS_EPSILON);
            let mut y = ((j as f32 + v) * inc).min(ONE_MINUS_EPSILON);

            if let Some(map) = mapper {
                (x, y) = map(x, y);
            }

            set[i * root + j] = [x, y];
        }
    }
}

/// Fill one set with `sample_root²` independent uniform samples.
///
/// No stratification: samples may clump and leave cells empty. Same layout
/// and `mapper` handling as [`generate_set`].
pub fn generate_random_set<R: Rng + ?Sized>(
    set: &mut [Sample],
    sample_root: u32,
    mapper: Option<Mapper>,
    rng: &mut R,
) {
    debug_assert_eq!(set.len(), (sample_root * sample_root) as usize);

    for sample in set.iter_mut() {
        let mut x: f32 = rng.gen();
        let mut y: f32 = rng.gen();
        if let Some(map) = mapper {
            (x, y) = map(x, y);
        }
        *sample = [x, y];
    }
}

/// Fill `pool` with back-to-back jittered sets of `sample_root²` samples.
///
/// The number of sets is `pool.len() / sample_root²`; a pool whose length is
/// not a whole number of sets is rejected, as is a sample root outside
/// `1..=MAX_SAMPLE_ROOT`.
pub fn generate<R: Rng + ?Sized>(
    pool: &mut [Sample],
    sample_root: u32,
    mapper: Option<Mapper>,
    rng: &mut R,
) -> Result<()> {
    fill_sets(pool, sample_root, |set| generate_set(set, sample_root, mapper, rng))
}

/// Like [`generate`] but with uniform sets from [`generate_random_set`].
pub fn generate_random<R: Rng + ?Sized>(
    pool: &mut [Sample],
    sample_root: u32,
    mapper: Option<Mapper>,
    rng: &mut R,
) -> Result<()> {
    fill_sets(pool, sample_root, |set| generate_random_set(set, sample_root, mapper, rng))
}

fn fill_sets(pool: &mut [Sample], sample_root: u32, mut fill: impl FnMut(&mut [Sample])) -> Result<()> {
    let per_set = validate_sample_root(sample_root)?;
    if pool.is_empty() || pool.len() % per_set != 0 {
        return Err(Error::invalid("sample pool length", pool.len()));
    }

    pool.chunks_exact_mut(per_set).for_each(&mut fill);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{map_to_unit_disk, MAX_SAMPLE_ROOT, NUM_SAMPLE_SETS};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_every_cell_gets_one_sample() {
        let mut rng = Pcg32::seed_from_u64(42);
        let root = 4u32;
        let mut set = vec![[0.0; 2]; 16];
        generate_set(&mut set, root, None, &mut rng);

        for i in 0..4 {
            for j in 0..4 {
                let [x, y] = set[i * 4 + j];
                assert_eq!((x * 4.0).floor() as usize, i, "x of cell ({i}, {j})");
                assert_eq!((y * 4.0).floor() as usize, j, "y of cell ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_all_roots_fill_pool_in_range() {
        let mut rng = Pcg32::seed_from_u64(9);
        for root in 1..=MAX_SAMPLE_ROOT {
            let len = NUM_SAMPLE_SETS * (root * root) as usize;

            let mut square = vec![[-1.0; 2]; len];
            generate(&mut square, root, None, &mut rng).unwrap();
            assert_eq!(square.len(), len);
            assert!(square
                .iter()
                .all(|&[x, y]| (0.0..1.0).contains(&x) && (0.0..1.0).contains(&y)));

            let mut disk = vec![[9.0; 2]; len];
            generate(&mut disk, root, Some(map_to_unit_disk), &mut rng).unwrap();
            assert!(disk.iter().all(|&[x, y]| x * x + y * y <= 1.0 + 1e-5));
        }
    }

    /// Cells of an `r × r` grid that hold no sample.
    fn empty_cells(set: &[Sample], root: usize) -> usize {
        let mut hit = vec![false; root * root];
        for &[x, y] in set {
            let i = ((x * root as f32) as usize).min(root - 1);
            let j = ((y * root as f32) as usize).min(root - 1);
            hit[i * root + j] = true;
        }
        hit.iter().filter(|&&h| !h).count()
    }

    #[test]
    fn test_jittered_covers_grid_where_uniform_clumps() {
        let mut rng = Pcg32::seed_from_u64(17);
        let mut jittered = vec![[0.0; 2]; NUM_SAMPLE_SETS * 64];
        let mut uniform = vec![[0.0; 2]; NUM_SAMPLE_SETS * 64];
        generate(&mut jittered, 8, None, &mut rng).unwrap();
        generate_random(&mut uniform, 8, None, &mut rng).unwrap();

        for (j, u) in jittered.chunks_exact(64).zip(uniform.chunks_exact(64)) {
            assert_eq!(empty_cells(j, 8), 0);
            // 64 uniform draws into 64 cells leave about 23 empty
            assert!(empty_cells(u, 8) > 5);
        }
        assert!(uniform.iter().all(|&[x, y]| (0.0..1.0).contains(&x) && (0.0..1.0).contains(&y)));
    }

    #[test]
    fn test_random_pool_applies_mapper_and_rejects_bad_length() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut disk = vec![[9.0; 2]; 2 * 9];
        generate_random(&mut disk, 3, Some(map_to_unit_disk), &mut rng).unwrap();
        assert!(disk.iter().all(|&[x, y]| x * x + y * y <= 1.0 + 1e-5));
        assert!(generate_random(&mut disk, 4, None, &mut rng).is_err());
    }

    #[test]
    fn test_sets_are_independent() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut pool = vec![[0.0; 2]; 2 * 16];
        generate(&mut pool, 4, None, &mut rng).unwrap();
        assert_ne!(pool[..16], pool[16..]);
    }

    #[test]
    fn test_rejects_bad_roots_and_lengths() {
        let mut rng = Pcg32::seed_from_u64(0);
        let mut pool = vec![[0.0; 2]; 16];
        assert!(matches!(
            generate(&mut pool, 0, None, &mut rng),
            Err(Error::InvalidSampleRoot(0))
        ));
        assert!(matches!(
            generate(&mut pool, 33, None, &mut rng),
            Err(Error::InvalidSampleRoot(33))
        ));
        assert!(generate(&mut pool, 3, None, &mut rng).is_err());
        assert!(generate(&mut [], 1, None, &mut rng).is_err());
    }

    #[test]
    fn test_upper_edge_is_clamped() {
        // A generator that always returns values just below one
        struct NearOne;
        impl rand::RngCore for NearOne {
            fn next_u32(&mut self) -> u32 {
                u32::MAX
            }
            fn next_u64(&mut self) -> u64 {
                u64::MAX
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0xff);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
                dest.fill(0xff);
                Ok(())
            }
        }

        let mut set = vec![[0.0; 2]; 32 * 32];
        generate_set(&mut set, 32, None, &mut NearOne);
        assert!(set.iter().all(|&[x, y]| x < 1.0 && y < 1.0));
    }
}
