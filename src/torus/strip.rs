//! Per-worker strip storage.
//!
//! A [`Band`] holds `own_rows + 2` rows: ghost row `0`, the worker's own rows
//! `1..=own_rows`, and ghost row `own_rows + 1`. A [`Strip`] double-buffers
//! two bands and flips a phase bit instead of copying.

use super::row::{AllocError, Row, alloc_rows};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Band {
    rows: Vec<Row>,
}

impl Band {
    pub fn new(own_rows: usize, width: usize) -> Result<Self, AllocError> {
        let count = own_rows.checked_add(2).ok_or(AllocError {
            rows: own_rows,
            width,
        })?;
        Ok(Self {
            rows: alloc_rows(count, width)?,
        })
    }

    /// Number of authoritative rows (ghost rows excluded).
    #[inline]
    pub fn own_rows(&self) -> usize {
        self.rows.len() - 2
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.rows[0].width()
    }

    #[inline]
    pub fn row(&self, y: usize) -> &Row {
        &self.rows[y]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut Row {
        &mut self.rows[y]
    }

    /// Authoritative rows in order.
    #[inline]
    pub fn own(&self) -> &[Row] {
        &self.rows[1..self.rows.len() - 1]
    }

    /// Wrap every row, ghost rows included.
    pub fn wrap_horizontal(&mut self) {
        for row in &mut self.rows {
            row.wrap_horizontal();
        }
    }

    pub fn population(&self) -> u64 {
        self.own().iter().map(|row| u64::from(row.population())).sum()
    }
}

#[derive(Clone, Debug)]
pub struct Strip {
    bands: [Band; 2],
    phase: u8,
}

impl Strip {
    pub fn new(own_rows: usize, width: usize) -> Result<Self, AllocError> {
        Ok(Self {
            bands: [Band::new(own_rows, width)?, Band::new(own_rows, width)?],
            phase: 0,
        })
    }

    #[inline]
    pub fn current(&self) -> &Band {
        &self.bands[self.phase as usize]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut Band {
        &mut self.bands[self.phase as usize]
    }

    /// Current band (read, plus ghost refresh) and next band (written).
    #[inline]
    pub fn bands_mut(&mut self) -> (&mut Band, &mut Band) {
        let (a, b) = self.bands.split_at_mut(1);
        if self.phase == 0 {
            (&mut a[0], &mut b[0])
        } else {
            (&mut b[0], &mut a[0])
        }
    }

    #[inline]
    pub fn swap(&mut self) {
        self.phase ^= 1;
    }
}
