//! 7-bag randomizer for piece generation
//!
//! All 7 pieces are shuffled, then dealt out one at a time. A fresh shuffle
//! only happens once the bag is empty, so the first and last pieces of
//! neighbouring bags may repeat.

use crate::tetromino::TetrominoType;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// The 7-bag piece randomizer
#[derive(Debug, Clone)]
pub struct Bag {
    /// Pieces left in the current permutation, front is dealt first
    remaining: Vec<TetrominoType>,
    rng: ChaCha8Rng,
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}

impl Bag {
    /// Create an empty bag seeded from the thread RNG
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create an empty bag with a fixed seed (reproducible sequences)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            remaining: Vec::with_capacity(7),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Rebuild a bag from persisted contents. `Dead` entries are dropped.
    pub fn with_contents(seed: u64, remaining: Vec<TetrominoType>) -> Self {
        let mut bag = Self::with_seed(seed);
        bag.remaining = remaining
            .into_iter()
            .filter(|t| *t != TetrominoType::Dead)
            .collect();
        bag
    }

    /// Take the next piece, reshuffling first if the bag is empty
    pub fn pull(&mut self) -> TetrominoType {
        if self.remaining.is_empty() {
            self.refill();
        }
        self.remaining.remove(0)
    }

    /// What is left of the current permutation
    pub fn contents(&self) -> &[TetrominoType] {
        &self.remaining
    }

    /// Throw away the current permutation; the next pull reshuffles
    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    fn refill(&mut self) {
        let mut new_bag = TetrominoType::all().to_vec();
        new_bag.shuffle(&mut self.rng);
        self.remaining = new_bag;
    }
}
