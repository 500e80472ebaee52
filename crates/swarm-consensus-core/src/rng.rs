use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive the seed for replicate `index` of an experiment, so that replicates
/// launched from one base seed draw independent streams.
pub fn replicate_seed(base_seed: u64, index: usize) -> u64 {
    base_seed.wrapping_add((index as u64).wrapping_mul(crate::constants::RNG_DERIVATION_PRIME))
}
