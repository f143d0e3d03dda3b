use std::hash::{Hash, Hasher};

use crate::state::GameState;

/// A deterministic FNV-1a 64-bit hasher.
///
/// `DefaultHasher` is randomized per process, so anything that must agree
/// across runs (state fingerprints, per-game seeds) goes through this instead.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Stable 64-bit fingerprint of a full game state.
pub fn fingerprint(state: &GameState) -> u64 {
    let mut hasher = FnvHasher::new();
    state.hash(&mut hasher);
    hasher.finish()
}

/// Seed for the `index`-th game of a batch. Depends only on its inputs so a
/// resumed batch replays the same games.
pub fn game_seed(base_seed: u64, index: u64) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write_u64(base_seed);
    hasher.write_u64(index);
    hasher.finish()
}
