//! Final gather of every worker's own rows at the coordinator.

use crate::error::Error;
use crate::transport::{CommError, Communicator, Rank, Tag};

use super::decomposition::Decomposition;
use super::grid::GlobalGrid;
use super::strip::Band;

/// Rank that assembles the global grid and reports the digest.
pub const COORDINATOR: Rank = 0;

/// Send `band`'s own rows to the coordinator, or, on the coordinator,
/// receive every other block and assemble the global grid.
///
/// Blocks are accepted in arrival order and placed by sender rank. `band`
/// should be wrapped so halo columns are consistent in the result.
pub fn collect<C: Communicator>(
    comm: &mut C,
    decomposition: &Decomposition,
    band: &Band,
) -> Result<Option<GlobalGrid>, Error> {
    let rank = comm.rank();
    if rank != COORDINATOR {
        let mut payload = Vec::with_capacity(band.own_rows() * band.row(1).words().len());
        for row in band.own() {
            payload.extend_from_slice(row.words());
        }
        comm.isend(COORDINATOR, Tag::Gather, &payload)?;
        return Ok(None);
    }

    let mut grid = GlobalGrid::new(decomposition.lines(), band.width())?;
    grid.place_rows(decomposition.offset(rank), band.own());

    let row_words = band.row(1).words().len();
    let size = comm.size();
    let mut received = vec![false; size];
    received[rank] = true;
    for _ in 1..size {
        let (source, words) = comm.recv_any(Tag::Gather)?;
        if source >= size {
            return Err(CommError::InvalidRank { peer: source, size }.into());
        }
        if received[source] {
            return Err(CommError::DuplicateBlock { peer: source }.into());
        }
        let expected = decomposition.rows(source) * row_words;
        if words.len() != expected {
            return Err(CommError::SizeMismatch {
                peer: source,
                tag: Tag::Gather,
                expected,
                actual: words.len(),
            }
            .into());
        }
        grid.place_words(decomposition.offset(source), &words);
        received[source] = true;
    }
    Ok(Some(grid))
}
