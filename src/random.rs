use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of bytes for the CXNN instruction, the only nondeterminism in the
/// machine. Swap in a `SequenceRandom` to make programs repeatable.
pub trait RandomSource {
    fn next_byte(&mut self) -> u8;
}

/// uniformly distributed bytes from the standard generator
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// seeded from OS entropy
    pub fn new() -> Self {
        StdRandom {
            rng: StdRng::from_entropy(),
        }
    }

    /// same seed, same bytes
    pub fn seeded(seed: u64) -> Self {
        StdRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for StdRandom {
    fn next_byte(&mut self) -> u8 {
        self.rng.gen()
    }
}

/// replays a fixed list of bytes, round and round
pub struct SequenceRandom {
    bytes: Vec<u8>,
    next: usize,
}

impl SequenceRandom {
    pub fn new(bytes: &[u8]) -> Self {
        assert!(!bytes.is_empty(), "SequenceRandom needs at least one byte");
        SequenceRandom {
            bytes: Vec::from(bytes),
            next: 0,
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_byte(&mut self) -> u8 {
        let b = self.bytes[self.next];
        self.next = (self.next + 1) % self.bytes.len();
        b
    }
}
