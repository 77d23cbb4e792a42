//! L'Ecuyer combined multiplicative congruential generator.
//!
//! Two MLCGs with prime moduli near 2^31 are combined by subtraction. Each
//! component is a pure multiplication modulo its prime, so jumping ahead by
//! `n` draws is one modular exponentiation per component. Workers use that to
//! land on their slice of the global stream without drawing it.

use rand::RngCore;

const M1: u64 = 2_147_483_563;
const A1: u64 = 40_014;
const M2: u64 = 2_147_483_399;
const A2: u64 = 40_692;

/// Seed of the initial configuration unless overridden.
pub const DEFAULT_SEED: u64 = 424_243;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LEcuyer {
    s1: u64,
    s2: u64,
}

impl LEcuyer {
    pub fn new(seed: u64) -> Self {
        // Both components must stay non-zero.
        Self {
            s1: 1 + seed % (M1 - 1),
            s2: 1 + seed % (M2 - 1),
        }
    }

    /// Next raw value in `1..M1`.
    #[inline]
    fn advance(&mut self) -> u64 {
        self.s1 = self.s1 * A1 % M1;
        self.s2 = self.s2 * A2 % M2;
        let z = self.s1 as i64 - self.s2 as i64;
        if z < 1 {
            (z + (M1 as i64 - 1)) as u64
        } else {
            z as u64
        }
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.advance() as f64 / M1 as f64
    }

    /// Uniform integer in `0..n`, truncating `next_f64() * n`.
    #[inline]
    pub fn rand_below(&mut self, n: u32) -> u32 {
        (self.next_f64() * n as f64) as u32
    }

    /// Fast-forward by `draws` values, as if `advance` had been called that
    /// many times.
    pub fn skip(&mut self, draws: u64) {
        self.s1 = self.s1 * pow_mod(A1, draws, M1) % M1;
        self.s2 = self.s2 * pow_mod(A2, draws, M2) % M2;
    }
}

impl Default for LEcuyer {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// `base^exp mod modulus` for moduli below 2^32.
fn pow_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result = 1u64;
    let mut base = base % modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    result
}

/// Raw outputs carry 31 bits; `next_u64` joins two of them.
impl RngCore for LEcuyer {
    fn next_u32(&mut self) -> u32 {
        self.advance() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.advance();
        let lo = self.advance();
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
