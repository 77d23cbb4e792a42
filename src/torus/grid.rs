//! Whole-torus grid, assembled on the coordinator after the last iteration.

use crate::digest::Digest;

use super::rng::LEcuyer;
use super::row::{AllocError, Row, alloc_rows};

/// Bytes hashed per `update` call.
const DIGEST_CHUNK: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalGrid {
    width: usize,
    rows: Vec<Row>,
}

impl GlobalGrid {
    pub fn new(lines: usize, width: usize) -> Result<Self, AllocError> {
        Ok(Self {
            width,
            rows: alloc_rows(lines, width)?,
        })
    }

    /// Initial configuration drawn serially: one draw per real cell in row
    /// order, a cell is alive when `rand_below(100) >= 50`.
    pub fn seeded(lines: usize, width: usize, seed: u64) -> Result<Self, AllocError> {
        let mut rng = LEcuyer::new(seed);
        let mut grid = Self::new(lines, width)?;
        for row in &mut grid.rows {
            seed_row(row, &mut rng);
            row.wrap_horizontal();
        }
        Ok(grid)
    }

    #[inline]
    pub fn lines(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn row(&self, y: usize) -> &Row {
        &self.rows[y]
    }

    /// Overwrite rows starting at `offset` from consecutive row-sized chunks
    /// of `words`.
    pub fn place_words(&mut self, offset: usize, words: &[u64]) {
        let per_row = self.rows.first().map_or(0, |row| row.words().len());
        for (row, chunk) in self.rows[offset..].iter_mut().zip(words.chunks_exact(per_row)) {
            row.words_mut().copy_from_slice(chunk);
        }
    }

    pub fn place_rows(&mut self, offset: usize, rows: &[Row]) {
        self.rows[offset..offset + rows.len()].clone_from_slice(rows);
    }

    pub fn population(&self) -> u64 {
        self.rows.iter().map(|row| u64::from(row.population())).sum()
    }

    /// BLAKE3 over one byte per cell, `width + 2` bytes per row with halos
    /// included, rows in order.
    pub fn digest(&self) -> Digest {
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; DIGEST_CHUNK];
        let mut filled = 0;
        for cell in self.rows.iter().flat_map(Row::cell_bytes) {
            buf[filled] = cell;
            filled += 1;
            if filled == DIGEST_CHUNK {
                hasher.update(&buf);
                filled = 0;
            }
        }
        hasher.update(&buf[..filled]);
        Digest::from(hasher.finalize())
    }
}

/// Fill the real columns of `row` from `rng`, left to right.
pub(crate) fn seed_row(row: &mut Row, rng: &mut LEcuyer) {
    for col in 1..=row.width() {
        row.set(col, rng.rand_below(100) >= 50);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamed_digest_matches_flat_bytes() {
        // 60 rows of 72 bytes spans a chunk boundary.
        let grid = GlobalGrid::seeded(60, 70, 11).unwrap();
        let flat: Vec<u8> = grid.rows.iter().flat_map(Row::cell_bytes).collect();
        assert_eq!(flat.len(), 60 * 72);
        assert_eq!(grid.digest(), Digest::from(blake3::hash(&flat)));
    }

    #[test]
    fn impossible_grid_is_an_error() {
        assert_eq!(
            GlobalGrid::new(usize::MAX / 16, 1024).unwrap_err(),
            AllocError {
                rows: usize::MAX / 16,
                width: 1024
            }
        );
    }

    #[test]
    fn seeded_rows_are_wrapped_and_about_half_alive() {
        let grid = GlobalGrid::seeded(8, 1024, 424_243).unwrap();
        assert!(grid.rows.iter().all(Row::halo_is_wrapped));
        let population = grid.population();
        assert!((3_700..4_500).contains(&population), "population {population}");
    }

    #[test]
    fn place_words_fills_consecutive_rows() {
        let source = GlobalGrid::seeded(4, 90, 3).unwrap();
        let mut words = Vec::new();
        for row in &source.rows[1..3] {
            words.extend_from_slice(row.words());
        }
        let mut target = GlobalGrid::new(4, 90).unwrap();
        target.place_words(1, &words);
        assert_eq!(target.row(1), source.row(1));
        assert_eq!(target.row(2), source.row(2));
        assert_eq!(target.row(0).population(), 0);
        assert_eq!(target.row(3).population(), 0);
    }
}
