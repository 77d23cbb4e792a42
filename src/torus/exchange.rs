//! Ghost-row exchange around the ring of workers.
//!
//! Each iteration a worker sends its first own row up and its last own row
//! down, then posts receives for both ghost rows. The caller computes the
//! interior while the transfers are in flight and calls
//! [`GhostExchange::finish`] before touching the boundary rows.

use crate::transport::{CommError, Communicator, PendingRecv, Rank, Tag};

use super::strip::Band;

/// Vertical neighbours of a rank on a ring of `size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingNeighbors {
    /// Owner of the rows above (`rank - 1`, wrapping).
    pub top: Rank,
    /// Owner of the rows below (`rank + 1`, wrapping).
    pub bottom: Rank,
}

impl RingNeighbors {
    pub fn of(rank: Rank, size: usize) -> Self {
        debug_assert!(rank < size);
        Self {
            top: (rank + size - 1) % size,
            bottom: (rank + 1) % size,
        }
    }
}

#[must_use = "ghost rows are only valid after `finish`"]
#[derive(Debug)]
pub struct GhostExchange {
    from_top: PendingRecv,
    from_bottom: PendingRecv,
}

impl GhostExchange {
    /// Send the boundary rows of `band` and post receives for its ghosts.
    /// Rows travel with their halo columns, so `band` must be wrapped.
    pub fn start<C: Communicator>(
        comm: &mut C,
        neighbors: RingNeighbors,
        band: &Band,
    ) -> Result<Self, CommError> {
        let last = band.own_rows();
        let row_words = band.row(1).words().len();

        comm.isend(neighbors.top, Tag::Upward, band.row(1).words())?;
        comm.isend(neighbors.bottom, Tag::Downward, band.row(last).words())?;

        // The top neighbour's last row travels down; the bottom neighbour's
        // first row travels up.
        let from_top = comm.irecv(neighbors.top, Tag::Downward, row_words)?;
        let from_bottom = comm.irecv(neighbors.bottom, Tag::Upward, row_words)?;
        Ok(Self {
            from_top,
            from_bottom,
        })
    }

    /// Wait for both ghost rows and store them in `band`.
    pub fn finish<C: Communicator>(self, comm: &mut C, band: &mut Band) -> Result<(), CommError> {
        let bottom_ghost = band.own_rows() + 1;
        comm.wait(self.from_top, band.row_mut(0).words_mut())?;
        comm.wait(self.from_bottom, band.row_mut(bottom_ghost).words_mut())?;
        Ok(())
    }
}
