//! # Entropy Capability
//!
//! Uniform integer randomness for randomized timer intervals and repeat
//! counts. Platforms with a hardware RNG implement [`EntropySource`]
//! directly; everyone else seeds a [`Pcg32`].

// =============================================================================
// CAPABILITY
// =============================================================================

/// Source of uniformly distributed integers.
pub trait EntropySource: Send {
    /// Draw a value uniformly from `[min, max)`.
    ///
    /// Degenerate ranges (`max <= min`) normalize to `min`.
    fn uniform(&mut self, min: u32, max: u32) -> u32;
}

// =============================================================================
// PCG32
// =============================================================================

/// PCG-XSH-RR random number generator (32-bit output, 64-bit state).
///
/// Small, fast, and good enough for interval jitter; not cryptographic.
#[derive(Clone, Copy, Debug)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Default increment (must be odd)
    const DEFAULT_INC: u64 = 1442695040888963407;

    /// Creates a new generator from a seed.
    pub const fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: Self::DEFAULT_INC,
        };
        rng.state = seed.wrapping_add(rng.inc);
        rng.step();
        rng
    }

    /// Steps the generator state
    const fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(self.inc);
    }

    /// Generates the next u32
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.step();

        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generates a u32 in `[0, bound)` without modulo bias.
    pub fn next_u32_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u32();
            if r >= threshold {
                return r % bound;
            }
        }
    }
}

impl EntropySource for Pcg32 {
    fn uniform(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        min + self.next_u32_bounded(max - min)
    }
}

// =============================================================================
// TESTS
// =============================================================================
