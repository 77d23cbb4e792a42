//! Bit-packed row of cells with one halo column on each side.
//!
//! Column `0` and column `width + 1` are halo columns. After
//! [`Row::wrap_horizontal`] the left halo mirrors column `width` and the
//! right halo mirrors column `1`, which closes the torus horizontally.
//! Bit `c % 64` of word `c / 64` holds column `c`.

use thiserror::Error;

/// A strip or grid too large for the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot allocate {rows} rows of width {width}")]
pub struct AllocError {
    pub rows: usize,
    pub width: usize,
}

/// Number of `u64` words needed for `width` real columns plus both halos.
#[inline]
pub const fn words_for_width(width: usize) -> usize {
    (width + 2).div_ceil(64)
}

/// Bits of word `word` that hold real (non-halo) columns of a row of `width`.
#[inline]
pub fn real_column_mask(width: usize, word: usize) -> u64 {
    let start = word * 64;
    let end = width + 1;
    if end <= start {
        return 0;
    }
    let mut mask = u64::MAX;
    if start == 0 {
        mask &= !1;
    }
    if end < start + 64 {
        mask &= (1u64 << (end - start)) - 1;
    }
    mask
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    width: usize,
    words: Vec<u64>,
}

impl Row {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            words: vec![0; words_for_width(width)],
        }
    }

    /// Like [`Row::new`], but reports allocator failure instead of aborting.
    pub fn try_new(width: usize) -> Result<Self, AllocError> {
        let err = AllocError { rows: 1, width };
        let len = width.checked_add(2).ok_or(err.clone())?.div_ceil(64);
        let mut words = Vec::new();
        words.try_reserve_exact(len).map_err(|_| err)?;
        words.resize(len, 0);
        Ok(Self { width, words })
    }

    /// Build a row whose real column `col` (1-based) is `alive(col)`.
    /// Halo columns start dead.
    pub fn from_fn(width: usize, mut alive: impl FnMut(usize) -> bool) -> Self {
        let mut row = Self::new(width);
        for col in 1..=width {
            row.set(col, alive(col));
        }
        row
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    #[inline]
    pub fn get(&self, col: usize) -> bool {
        debug_assert!(col <= self.width + 1, "column {col} outside row of width {}", self.width);
        (self.words[col / 64] >> (col % 64)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, col: usize, alive: bool) {
        debug_assert!(col <= self.width + 1, "column {col} outside row of width {}", self.width);
        let mask = 1u64 << (col % 64);
        let word = &mut self.words[col / 64];
        if alive {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    #[inline]
    pub fn left_halo(&self) -> bool {
        self.get(0)
    }

    #[inline]
    pub fn right_halo(&self) -> bool {
        self.get(self.width + 1)
    }

    /// Copy the last real column into the left halo and the first real
    /// column into the right halo.
    pub fn wrap_horizontal(&mut self) {
        let last = self.get(self.width);
        let first = self.get(1);
        self.set(0, last);
        self.set(self.width + 1, first);
    }

    pub fn halo_is_wrapped(&self) -> bool {
        self.left_halo() == self.get(self.width) && self.right_halo() == self.get(1)
    }

    /// Live cells among the real columns.
    pub fn population(&self) -> u32 {
        self.words
            .iter()
            .enumerate()
            .map(|(i, word)| (word & real_column_mask(self.width, i)).count_ones())
            .sum()
    }

    /// One byte (`0` or `1`) per column, halos included.
    pub fn cell_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.width + 2).map(|col| u8::from(self.get(col)))
    }

    /// `0`/`1` text of every column, halos included.
    pub fn to_bit_string(&self) -> String {
        self.cell_bytes().map(|cell| char::from(b'0' + cell)).collect()
    }
}

/// `count` dead rows of `width`, or an error if the allocator refuses.
pub(crate) fn alloc_rows(count: usize, width: usize) -> Result<Vec<Row>, AllocError> {
    let err = AllocError { rows: count, width };
    let mut rows = Vec::new();
    rows.try_reserve_exact(count).map_err(|_| err.clone())?;
    for _ in 0..count {
        rows.push(Row::try_new(width).map_err(|_| err.clone())?);
    }
    Ok(rows)
}
