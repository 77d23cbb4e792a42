//! Message passing between strip workers.
//!
//! [`Communicator`] is the substrate the simulation runs on: rank and world
//! size discovery, buffered non-blocking sends, posted receives completed by
//! `wait`, receive-from-any-source for the final gather, and a collective
//! `finalize`. Two backends implement it over the same mailbox logic:
//! [`local`] (in-process channels) and [`tcp`] (one process per worker).

mod endpoint;
pub mod local;
mod mailbox;
pub mod tcp;

use thiserror::Error;

pub use endpoint::{Endpoint, Link};

pub type Rank = usize;

/// Message labels shared by sender and receiver.
///
/// Ghost rows carry the direction they travel in, so a worker whose two ring
/// neighbours are the same rank (or itself) still files each row into the
/// right ghost slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// First own row, sent to the top neighbour (`rank - 1`).
    Upward = 1,
    /// Last own row, sent to the bottom neighbour (`rank + 1`).
    Downward = 2,
    /// Final own rows, sent to the coordinator.
    Gather = 3,
    /// Sent once to every peer by `finalize`.
    Shutdown = 4,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Upward, Tag::Downward, Tag::Gather, Tag::Shutdown];

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Tag> {
        Tag::ALL.into_iter().find(|tag| tag.as_u8() == value)
    }
}

#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {peer} is no longer reachable")]
    Disconnected { peer: Rank },

    #[error("lost rank {peer}: {reason}")]
    PeerLost { peer: Rank, reason: String },

    #[error("expected {expected} words from rank {peer} ({tag:?}), got {actual}")]
    SizeMismatch {
        peer: Rank,
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    #[error("rank {peer} is outside a world of {size}")]
    InvalidRank { peer: Rank, size: usize },

    #[error("rank {peer} delivered its gather block twice")]
    DuplicateBlock { peer: Rank },

    #[error("malformed frame from rank {peer}: {reason}")]
    Malformed { peer: Rank, reason: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("mailbox closed")]
    MailboxClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A posted receive. Complete it with [`Communicator::wait`].
#[derive(Debug)]
#[must_use = "a posted receive must be completed with `wait`"]
pub struct PendingRecv {
    source: Rank,
    tag: Tag,
    len: usize,
}

/// Point-to-point message passing within a fixed world of ranks.
pub trait Communicator {
    fn rank(&self) -> Rank;

    fn size(&self) -> usize;

    /// Queue `words` for `dest`. Completes locally; the payload is copied.
    fn isend(&mut self, dest: Rank, tag: Tag, words: &[u64]) -> Result<(), CommError>;

    /// Post a receive of exactly `len` words from `source` with `tag`.
    fn irecv(&mut self, source: Rank, tag: Tag, len: usize) -> Result<PendingRecv, CommError>;

    /// Block until `pending` has arrived and copy it into `into`.
    fn wait(&mut self, pending: PendingRecv, into: &mut [u64]) -> Result<(), CommError>;

    /// Block until any rank delivers a message with `tag`.
    fn recv_any(&mut self, tag: Tag) -> Result<(Rank, Vec<u64>), CommError>;

    /// Collective shutdown: returns once every peer has also finalized.
    fn finalize(self) -> Result<(), CommError>
    where
        Self: Sized;
}
