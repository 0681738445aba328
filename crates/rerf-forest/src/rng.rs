//! Per-tree random number streams.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// How the master seed stream is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SeedMode {
    /// Reproducible training from a fixed seed.
    Fixed(u64),
    /// Seed from operating-system entropy.
    Entropy,
}

/// Random stream owned by exactly one tree.
///
/// Wraps a [`ChaCha8Rng`]; bounded draws go through `gen_range`, which
/// rejects rather than reducing modulo `n`, so they carry no bias.
#[derive(Debug, Clone)]
pub struct TreeRng {
    inner: ChaCha8Rng,
}

impl TreeRng {
    /// Create a stream from a per-tree seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Uniform integer in `[0, n)`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    #[inline]
    pub fn next_bounded(&mut self, n: usize) -> usize {
        self.inner.gen_range(0..n)
    }
}

/// Master stream that hands one independent seed to each tree.
#[derive(Debug)]
pub(crate) struct SeedStream {
    master: ChaCha8Rng,
}

impl SeedStream {
    pub(crate) fn new(mode: SeedMode) -> Self {
        let master = match mode {
            SeedMode::Fixed(seed) => ChaCha8Rng::seed_from_u64(seed),
            SeedMode::Entropy => ChaCha8Rng::from_entropy(),
        };
        Self { master }
    }

    /// Draw `n` per-tree seeds, in tree order.
    pub(crate) fn tree_seeds(&mut self, n: usize) -> Vec<u64> {
        (0..n).map(|_| self.master.r#gen()).collect()
    }
}
