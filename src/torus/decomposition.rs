//! Static division of the global rows into contiguous strips.
//!
//! Rank `r` of `W` gets `L / W` rows, plus one when `r < L % W`; its strip
//! starts at the prefix sum of the earlier counts. A rank with no rows cannot
//! take part in the ring exchange, so that case is rejected outright.

use thiserror::Error;

use crate::transport::Rank;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompositionError {
    #[error("cannot decompose a grid onto zero workers")]
    NoWorkers,
    #[error("grid has no rows")]
    NoRows,
    #[error("{lines} rows cannot feed {workers} workers: rank {starved_rank} would get no rows")]
    TooFewRows {
        lines: usize,
        workers: usize,
        starved_rank: Rank,
    },
}

/// One rank's share of the global grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub rank: Rank,
    pub rows: usize,
    /// Global index of the first own row.
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decomposition {
    lines: usize,
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl Decomposition {
    pub fn new(lines: usize, workers: usize) -> Result<Self, DecompositionError> {
        if workers == 0 {
            return Err(DecompositionError::NoWorkers);
        }
        if lines == 0 {
            return Err(DecompositionError::NoRows);
        }
        if lines < workers {
            return Err(DecompositionError::TooFewRows {
                lines,
                workers,
                starved_rank: lines,
            });
        }

        let base = lines / workers;
        let remainder = lines % workers;
        let counts: Vec<usize> = (0..workers)
            .map(|rank| base + usize::from(rank < remainder))
            .collect();
        let offsets = counts
            .iter()
            .scan(0usize, |next, &count| {
                let offset = *next;
                *next += count;
                Some(offset)
            })
            .collect();

        Ok(Self {
            lines,
            counts,
            offsets,
        })
    }

    #[inline]
    pub fn lines(&self) -> usize {
        self.lines
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn rows(&self, rank: Rank) -> usize {
        self.counts[rank]
    }

    #[inline]
    pub fn offset(&self, rank: Rank) -> usize {
        self.offsets[rank]
    }

    pub fn assignment(&self, rank: Rank) -> Assignment {
        Assignment {
            rank,
            rows: self.rows(rank),
            offset: self.offset(rank),
        }
    }

    pub fn assignments(&self) -> impl Iterator<Item = Assignment> + '_ {
        (0..self.workers()).map(|rank| self.assignment(rank))
    }
}
