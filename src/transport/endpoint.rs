//! Rank-local side of a world: outgoing links plus the shared mailbox.

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use super::mailbox::{Delivery, Envelope, Mailbox};
use super::{CommError, Communicator, PendingRecv, Rank, Tag};

/// Outgoing connection to one peer.
pub trait Link: Send {
    fn post(&mut self, tag: Tag, words: &[u64]) -> Result<(), CommError>;

    /// Release the link after a clean `finalize`.
    fn close(self) -> Result<(), CommError>
    where
        Self: Sized;

    /// Tell the peer this rank is gone without finalizing.
    fn abandon(&mut self);
}

#[derive(Debug)]
pub struct Endpoint<L: Link> {
    rank: Rank,
    size: usize,
    /// Indexed by peer rank; `None` at this rank's own index.
    links: Vec<Option<L>>,
    loopback: Sender<Delivery>,
    mailbox: Mailbox,
    finalized: bool,
}

impl<L: Link> Endpoint<L> {
    pub(crate) fn new(
        rank: Rank,
        links: Vec<Option<L>>,
        loopback: Sender<Delivery>,
        inbox: Receiver<Delivery>,
    ) -> Self {
        debug_assert!(links[rank].is_none());
        Self {
            rank,
            size: links.len(),
            links,
            loopback,
            mailbox: Mailbox::new(inbox),
            finalized: false,
        }
    }

    fn check_rank(&self, peer: Rank) -> Result<(), CommError> {
        if peer < self.size {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                peer,
                size: self.size,
            })
        }
    }
}

impl<L: Link> Communicator for Endpoint<L> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&mut self, dest: Rank, tag: Tag, words: &[u64]) -> Result<(), CommError> {
        self.check_rank(dest)?;
        if dest == self.rank {
            return self
                .loopback
                .send(Delivery::Message(Envelope {
                    source: self.rank,
                    tag,
                    words: words.to_vec(),
                }))
                .map_err(|_| CommError::MailboxClosed);
        }
        match self.links[dest].as_mut() {
            Some(link) => link.post(tag, words),
            None => Err(CommError::Disconnected { peer: dest }),
        }
    }

    fn irecv(&mut self, source: Rank, tag: Tag, len: usize) -> Result<PendingRecv, CommError> {
        self.check_rank(source)?;
        Ok(PendingRecv { source, tag, len })
    }

    fn wait(&mut self, pending: PendingRecv, into: &mut [u64]) -> Result<(), CommError> {
        let envelope = self.mailbox.take(Some(pending.source), pending.tag)?;
        if envelope.words.len() != pending.len || into.len() != pending.len {
            return Err(CommError::SizeMismatch {
                peer: pending.source,
                tag: pending.tag,
                expected: into.len(),
                actual: envelope.words.len(),
            });
        }
        into.copy_from_slice(&envelope.words);
        Ok(())
    }

    fn recv_any(&mut self, tag: Tag) -> Result<(Rank, Vec<u64>), CommError> {
        let envelope = self.mailbox.take(None, tag)?;
        Ok((envelope.source, envelope.words))
    }

    fn finalize(mut self) -> Result<(), CommError> {
        let peers: Vec<Rank> = (0..self.size).filter(|&peer| peer != self.rank).collect();
        for &peer in &peers {
            self.isend(peer, Tag::Shutdown, &[])?;
        }
        for &peer in &peers {
            self.mailbox.take(Some(peer), Tag::Shutdown)?;
        }
        self.finalized = true;
        debug!(rank = self.rank, "finalized");
        for link in std::mem::take(&mut self.links).into_iter().flatten() {
            link.close()?;
        }
        Ok(())
    }
}

impl<L: Link> Drop for Endpoint<L> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        if self.links.iter().any(Option::is_some) {
            warn!(rank = self.rank, "endpoint dropped before finalize; notifying peers");
        }
        for link in self.links.iter_mut().flatten() {
            link.abandon();
        }
    }
}
