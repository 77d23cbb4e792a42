//! Row kernels for the annealing rule.
//!
//! `Scalar` walks cells and consults the lookup table. `Bitsliced` advances
//! 64 cells per word with a full-adder chain over the nine block planes.
//! Both write dead halo columns, so their outputs compare equal.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::row::{Row, real_column_mask};
use super::rules::transition;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelBackend {
    Scalar,
    #[default]
    Bitsliced,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kernel backend: {0} (expected scalar or bitsliced)")]
pub struct UnknownKernel(pub String);

impl FromStr for KernelBackend {
    type Err = UnknownKernel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" => Ok(KernelBackend::Scalar),
            "bitsliced" => Ok(KernelBackend::Bitsliced),
            other => Err(UnknownKernel(other.to_string())),
        }
    }
}

impl fmt::Display for KernelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelBackend::Scalar => f.write_str("scalar"),
            KernelBackend::Bitsliced => f.write_str("bitsliced"),
        }
    }
}

/// Write the next state of `row` into `next`.
#[inline]
pub fn advance_row(backend: KernelBackend, above: &Row, row: &Row, below: &Row, next: &mut Row) {
    match backend {
        KernelBackend::Scalar => advance_row_scalar(above, row, below, next),
        KernelBackend::Bitsliced => advance_row_bitsliced(above, row, below, next),
    }
}

pub fn advance_row_scalar(above: &Row, row: &Row, below: &Row, next: &mut Row) {
    let width = row.width();
    for col in 1..=width {
        next.set(col, transition(above, row, below, col));
    }
    next.set(0, false);
    next.set(width + 1, false);
}

#[inline(always)]
fn full_add(a: u64, b: u64, c: u64) -> (u64, u64) {
    let sum = a ^ b ^ c;
    let carry = (a & b) | (b & c) | (a & c);
    (sum, carry)
}

#[inline(always)]
fn half_add(a: u64, b: u64) -> (u64, u64) {
    (a ^ b, a & b)
}

/// West, centre and east planes for word `i`: bit `b` of each holds column
/// `64 * i + b - 1`, `64 * i + b` and `64 * i + b + 1`.
#[inline(always)]
fn column_planes(words: &[u64], i: usize) -> (u64, u64, u64) {
    let word = words[i];
    let carry_in = if i == 0 { 0 } else { words[i - 1] >> 63 };
    let carry_out = if i + 1 == words.len() { 0 } else { words[i + 1] << 63 };
    ((word << 1) | carry_in, word, (word >> 1) | carry_out)
}

pub fn advance_row_bitsliced(above: &Row, row: &Row, below: &Row, next: &mut Row) {
    let width = row.width();
    let (a, r, b) = (above.words(), row.words(), below.words());
    debug_assert!(a.len() == r.len() && b.len() == r.len());
    let out = next.words_mut();

    for i in 0..r.len() {
        let (nw, n, ne) = column_planes(a, i);
        let (w, c, e) = column_planes(r, i);
        let (sw, s, se) = column_planes(b, i);

        // Count of the nine planes as ones + 2*twos + 4*fours + 8*eights.
        let (a0, a1) = full_add(nw, n, ne);
        let (b0, b1) = full_add(w, c, e);
        let (c0, c1) = full_add(sw, s, se);
        let (ones, d1) = full_add(a0, b0, c0);
        let (t, f0) = full_add(a1, b1, c1);
        let (twos, f1) = half_add(t, d1);
        let (fours, eights) = half_add(f0, f1);

        // Alive for 4, 6, 7, 8 or 9.
        let alive = eights | (fours & (twos | !ones));
        out[i] = alive & real_column_mask(width, i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use rand::SeedableRng;

    fn random_row(rng: &mut impl RngCore, width: usize, density_pct: u64) -> Row {
        let mut row = Row::from_fn(width, |_| rng.next_u64() % 100 < density_pct);
        row.wrap_horizontal();
        row
    }

    #[test]
    fn backends_agree_on_random_rows() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
        for width in [1usize, 2, 3, 62, 63, 64, 65, 127, 128, 200, 1024] {
            for density in [10u64, 42, 50, 83] {
                let above = random_row(&mut rng, width, density);
                let row = random_row(&mut rng, width, density);
                let below = random_row(&mut rng, width, density);
                let mut scalar = Row::new(width);
                let mut sliced = Row::new(width);
                // Stale bits in the destination must not leak through.
                sliced.words_mut().fill(u64::MAX);
                scalar.words_mut().fill(u64::MAX);
                advance_row_scalar(&above, &row, &below, &mut scalar);
                advance_row_bitsliced(&above, &row, &below, &mut sliced);
                // Scalar leaves padding bits beyond the right halo untouched.
                for col in 0..width + 2 {
                    assert_eq!(
                        scalar.get(col),
                        sliced.get(col),
                        "width {width} density {density} column {col}"
                    );
                }
            }
        }
    }

    #[test]
    fn adder_chain_matches_table_for_every_count() {
        // One column with `live` cells set among its 3x3 block.
        for live in 0usize..=9 {
            let mut rows = [Row::new(3), Row::new(3), Row::new(3)];
            for k in 0..live {
                rows[k / 3].set(1 + k % 3, true);
            }
            let mut next = Row::new(3);
            advance_row_bitsliced(&rows[0], &rows[1], &rows[2], &mut next);
            assert_eq!(next.get(2), live == 4 || live >= 6, "count {live}");
        }
    }

    #[test]
    fn full_grid_stays_full_and_empty_stays_empty() {
        let mut full = Row::from_fn(130, |_| true);
        full.wrap_horizontal();
        let empty = Row::new(130);
        for backend in [KernelBackend::Scalar, KernelBackend::Bitsliced] {
            let mut next = Row::new(130);
            advance_row(backend, &full, &full, &full, &mut next);
            assert_eq!(next.population(), 130, "{backend}");
            advance_row(backend, &empty, &empty, &empty, &mut next);
            assert_eq!(next.population(), 0, "{backend}");
        }
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!("scalar".parse(), Ok(KernelBackend::Scalar));
        assert_eq!("BitSliced".parse(), Ok(KernelBackend::Bitsliced));
        assert!("avx2".parse::<KernelBackend>().is_err());
    }
}
