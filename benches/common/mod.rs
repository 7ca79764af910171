//! Shared helpers for the benchmark suite.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vqfilter::VectorQuotientFilter;

/// Deterministic stream of uniform 64-bit hashes.
pub fn random_hashes(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen()).collect()
}

/// A filter loaded to the requested fraction of its capacity.
pub fn loaded_filter(nslots: u64, load: f64, seed: u64) -> VectorQuotientFilter {
    let filter = VectorQuotientFilter::new(nslots).expect("bench filter");
    let target = (filter.capacity() as f64 * load) as u64;
    let mut rng = StdRng::seed_from_u64(seed);
    while filter.len() < target {
        let _ = filter.insert(rng.gen::<u64>());
    }
    filter
}
