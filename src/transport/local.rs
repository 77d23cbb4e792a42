//! In-process world: every rank is an [`Endpoint`] fed by crossbeam channels.
//!
//! Endpoints are `Send`, so callers run each rank on its own thread.

use crossbeam_channel::{Sender, unbounded};

use super::mailbox::{Delivery, Envelope};
use super::{CommError, Endpoint, Link, Rank, Tag};

pub struct ChannelLink {
    source: Rank,
    dest: Rank,
    peer: Sender<Delivery>,
}

impl Link for ChannelLink {
    fn post(&mut self, tag: Tag, words: &[u64]) -> Result<(), CommError> {
        self.peer
            .send(Delivery::Message(Envelope {
                source: self.source,
                tag,
                words: words.to_vec(),
            }))
            .map_err(|_| CommError::Disconnected { peer: self.dest })
    }

    fn close(self) -> Result<(), CommError> {
        Ok(())
    }

    fn abandon(&mut self) {
        let _ = self.peer.send(Delivery::Lost {
            source: self.source,
            reason: "worker exited before finalize".to_string(),
        });
    }
}

pub type LocalEndpoint = Endpoint<ChannelLink>;

/// Endpoints for ranks `0..size`, in rank order.
pub fn cluster(size: usize) -> Vec<LocalEndpoint> {
    let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
    inboxes
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| {
            let links = senders
                .iter()
                .enumerate()
                .map(|(dest, peer)| {
                    (dest != rank).then(|| ChannelLink {
                        source: rank,
                        dest,
                        peer: peer.clone(),
                    })
                })
                .collect();
            Endpoint::new(rank, links, senders[rank].clone(), inbox)
        })
        .collect()
}

/// A world of one: every send is delivered to itself.
pub fn singleton() -> LocalEndpoint {
    let (loopback, inbox) = unbounded();
    Endpoint::new(0, vec![None], loopback, inbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Communicator;
    use std::thread;

    #[test]
    fn singleton_talks_to_itself() {
        let mut comm = singleton();
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        comm.isend(0, Tag::Upward, &[1, 2]).unwrap();
        comm.isend(0, Tag::Downward, &[3, 4]).unwrap();
        let down = comm.irecv(0, Tag::Downward, 2).unwrap();
        let up = comm.irecv(0, Tag::Upward, 2).unwrap();
        let mut buf = [0u64; 2];
        comm.wait(down, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        comm.wait(up, &mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        comm.finalize().unwrap();
    }

    #[test]
    fn two_ranks_distinguish_rows_by_tag() {
        let results: Vec<[u64; 2]> = thread::scope(|scope| {
            let handles: Vec<_> = cluster(2)
                .into_iter()
                .map(|mut comm| {
                    scope.spawn(move || {
                        let me = comm.rank() as u64;
                        let other = 1 - comm.rank();
                        comm.isend(other, Tag::Upward, &[me * 10 + 1]).unwrap();
                        comm.isend(other, Tag::Downward, &[me * 10 + 2]).unwrap();
                        let from_top = comm.irecv(other, Tag::Downward, 1).unwrap();
                        let from_bottom = comm.irecv(other, Tag::Upward, 1).unwrap();
                        let mut top = [0u64];
                        let mut bottom = [0u64];
                        comm.wait(from_bottom, &mut bottom).unwrap();
                        comm.wait(from_top, &mut top).unwrap();
                        comm.finalize().unwrap();
                        [top[0], bottom[0]]
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results, vec![[12, 11], [2, 1]]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut comm = singleton();
        comm.isend(0, Tag::Gather, &[1, 2, 3]).unwrap();
        let pending = comm.irecv(0, Tag::Gather, 2).unwrap();
        let mut buf = [0u64; 2];
        let err = comm.wait(pending, &mut buf).unwrap_err();
        assert!(
            matches!(err, CommError::SizeMismatch { expected: 2, actual: 3, .. }),
            "{err}"
        );
    }

    #[test]
    fn out_of_world_rank_is_rejected() {
        let mut comm = singleton();
        assert!(matches!(
            comm.isend(3, Tag::Upward, &[]),
            Err(CommError::InvalidRank { peer: 3, size: 1 })
        ));
    }

    #[test]
    fn dropping_a_rank_fails_its_peers() {
        let mut endpoints = cluster(2);
        let quitter = endpoints.pop().unwrap();
        let mut survivor = endpoints.pop().unwrap();
        drop(quitter);
        let pending = survivor.irecv(1, Tag::Upward, 1).unwrap();
        let mut buf = [0u64];
        let err = survivor.wait(pending, &mut buf).unwrap_err();
        assert!(matches!(err, CommError::PeerLost { peer: 1, .. }), "{err}");
    }

    #[test]
    fn gather_from_any_source_reports_sender() {
        let mut received: Vec<(Rank, Vec<u64>)> = thread::scope(|scope| {
            let mut endpoints = cluster(4).into_iter();
            let mut root = endpoints.next().unwrap();
            for mut comm in endpoints {
                scope.spawn(move || {
                    let rank = comm.rank() as u64;
                    comm.isend(0, Tag::Gather, &[rank; 3]).unwrap();
                    comm.finalize().unwrap();
                });
            }
            let blocks = (0..3).map(|_| root.recv_any(Tag::Gather).unwrap()).collect();
            root.finalize().unwrap();
            blocks
        });
        received.sort();
        assert_eq!(
            received,
            vec![(1, vec![1, 1, 1]), (2, vec![2, 2, 2]), (3, vec![3, 3, 3])]
        );
    }
}
