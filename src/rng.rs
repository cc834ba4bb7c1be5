//! Embedded seeded PRNG for the bootstrap and the path sampler.
//!
//! Splittable: sub-streams are derived from a parent seed and a stream
//! index, so shards draw independent sequences that are reproducible for a
//! given top-level seed. Kept in-crate (no `rand` dependency) so results
//! are bit-stable across platforms and dependency upgrades.

/// SplitMix64 stepper, used for seed spreading and sub-stream derivation.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Create a stepper from a seed
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next 64-bit output
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Simulation PRNG: xorshift64* core seeded through SplitMix64.
#[derive(Debug, Clone)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a generator from a seed
    pub fn new(seed: u64) -> Self {
        let mut mixer = SplitMix64::new(seed);
        let mut state = mixer.next_u64();
        // xorshift requires a non-zero state
        if state == 0 {
            state = 0x9E37_79B9_7F4A_7C15;
        }
        Self { state }
    }

    /// Derive an independent sub-stream for `stream` (shard index, asset
    /// index, ...). Deterministic in `(seed, stream)`.
    pub fn split(seed: u64, stream: u64) -> Self {
        let mut mixer = SplitMix64::new(seed);
        let base = mixer.next_u64();
        Self::new(base ^ stream.wrapping_mul(0xA24B_AED4_963E_E407))
    }

    /// Next 64-bit output
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform draw in the half-open interval [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform draw in the half-open interval (0, 1]; safe under `ln`
    fn next_open_f64(&mut self) -> f64 {
        ((self.next_u64() >> 11) + 1) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Random index in `[0, n)`.
    ///
    /// Rejection sampling eliminates modulo bias when `n` does not divide
    /// `u64::MAX` evenly.
    pub fn next_usize(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let n64 = n as u64;
        let threshold = u64::MAX - (u64::MAX % n64);
        loop {
            let x = self.next_u64();
            if x < threshold {
                return (x % n64) as usize;
            }
        }
    }

    /// One standard normal via Box–Muller.
    ///
    /// Consumes one uniform pair per draw (the sine branch is discarded),
    /// matching the one-pair-per-normal sampling contract.
    pub fn next_gaussian(&mut self) -> f64 {
        let u1 = self.next_open_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}
