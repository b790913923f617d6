//! Seeded shuffle orders for composite sources
//!
//! A [`ShuffleOrder`] is a permutation of `[0, len)`. The caller supplies the
//! explicit prefix; indices it does not mention (for instance items inserted
//! since the host last computed an order) are appended in a permutation drawn
//! from the order's own seed, so the same inputs always replay the same order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{PlayerError, Result};

/// Permutation of a composite node's children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    indices: Vec<usize>,
    seed: u64,
}

impl ShuffleOrder {
    /// Build an order of length `len` honouring `explicit` as its prefix
    ///
    /// Fails if `explicit` names an index twice or an index `>= len`.
    pub fn new(explicit: &[usize], len: usize, seed: u64) -> Result<Self> {
        let mut seen = vec![false; len];
        let mut indices = Vec::with_capacity(len);

        for &index in explicit {
            if index >= len {
                return Err(PlayerError::InvalidCommandArgument(format!(
                    "shuffle index {} out of range for {} children",
                    index, len
                )));
            }
            if seen[index] {
                return Err(PlayerError::InvalidCommandArgument(format!(
                    "shuffle index {} appears twice",
                    index
                )));
            }
            seen[index] = true;
            indices.push(index);
        }

        let mut unseen: Vec<usize> = (0..len).filter(|&i| !seen[i]).collect();
        if !unseen.is_empty() {
            let mut rng = StdRng::seed_from_u64(seed);
            unseen.shuffle(&mut rng);
            indices.extend(unseen);
        }

        Ok(Self { indices, seed })
    }

    /// Play-in-order permutation (used for looping expansions)
    pub fn identity(len: usize) -> Self {
        Self { indices: (0..len).collect(), seed: 0 }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Source of seeds for decoded shuffle orders
///
/// Seeded explicitly in tests and from entropy only at the process boundary.
pub struct ShuffleOrderManager {
    rng: StdRng,
}

impl ShuffleOrderManager {
    /// Deterministic manager: the same seed yields the same sequence of orders
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Decode a host-supplied permutation for a composite of `len` children
    pub fn decode(&mut self, explicit: &[usize], len: usize) -> Result<ShuffleOrder> {
        let seed = self.rng.gen();
        ShuffleOrder::new(explicit, len, seed)
    }
}
