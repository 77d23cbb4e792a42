//! Incoming message queue with (source, tag) matching.
//!
//! Messages that arrive before a matching receive is waited on are parked in
//! `unexpected` and handed out first on later matches, in arrival order.

use std::collections::{BTreeMap, VecDeque};

use crossbeam_channel::Receiver;

use super::{CommError, Rank, Tag};

#[derive(Debug)]
pub(crate) struct Envelope {
    pub source: Rank,
    pub tag: Tag,
    pub words: Vec<u64>,
}

#[derive(Debug)]
pub(crate) enum Delivery {
    Message(Envelope),
    /// The link to `source` broke before it finalized.
    Lost { source: Rank, reason: String },
}

#[derive(Debug)]
pub(crate) struct Mailbox {
    inbox: Receiver<Delivery>,
    unexpected: VecDeque<Envelope>,
    lost: BTreeMap<Rank, String>,
}

impl Mailbox {
    pub fn new(inbox: Receiver<Delivery>) -> Self {
        Self {
            inbox,
            unexpected: VecDeque::new(),
            lost: BTreeMap::new(),
        }
    }

    /// Next message with `tag` from `source`, or from anyone when `None`.
    pub fn take(&mut self, source: Option<Rank>, tag: Tag) -> Result<Envelope, CommError> {
        let wanted = |env: &Envelope| env.tag == tag && source.is_none_or(|s| env.source == s);

        if let Some(pos) = self.unexpected.iter().position(|env| wanted(env)) {
            if let Some(env) = self.unexpected.remove(pos) {
                return Ok(env);
            }
        }

        loop {
            self.check_lost(source)?;
            match self.inbox.recv() {
                Ok(Delivery::Message(env)) if wanted(&env) => return Ok(env),
                Ok(Delivery::Message(env)) => self.unexpected.push_back(env),
                Ok(Delivery::Lost { source: peer, reason }) => {
                    self.lost.insert(peer, reason);
                }
                Err(_) => return Err(CommError::MailboxClosed),
            }
        }
    }

    fn check_lost(&self, source: Option<Rank>) -> Result<(), CommError> {
        let lost = match source {
            Some(peer) => self.lost.get_key_value(&peer),
            None => self.lost.iter().next(),
        };
        match lost {
            Some((&peer, reason)) => Err(CommError::PeerLost {
                peer,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn message(source: Rank, tag: Tag, word: u64) -> Delivery {
        Delivery::Message(Envelope {
            source,
            tag,
            words: vec![word],
        })
    }

    #[test]
    fn matches_by_source_and_tag_out_of_order() {
        let (tx, rx) = unbounded();
        let mut mailbox = Mailbox::new(rx);
        tx.send(message(1, Tag::Upward, 10)).unwrap();
        tx.send(message(1, Tag::Downward, 20)).unwrap();
        tx.send(message(2, Tag::Upward, 30)).unwrap();

        assert_eq!(mailbox.take(Some(2), Tag::Upward).unwrap().words, vec![30]);
        assert_eq!(mailbox.take(Some(1), Tag::Downward).unwrap().words, vec![20]);
        assert_eq!(mailbox.take(Some(1), Tag::Upward).unwrap().words, vec![10]);
    }

    #[test]
    fn same_source_and_tag_keeps_arrival_order() {
        let (tx, rx) = unbounded();
        let mut mailbox = Mailbox::new(rx);
        tx.send(message(0, Tag::Gather, 1)).unwrap();
        tx.send(message(3, Tag::Upward, 9)).unwrap();
        tx.send(message(0, Tag::Gather, 2)).unwrap();

        assert_eq!(mailbox.take(Some(3), Tag::Upward).unwrap().words, vec![9]);
        assert_eq!(mailbox.take(None, Tag::Gather).unwrap().words, vec![1]);
        assert_eq!(mailbox.take(None, Tag::Gather).unwrap().words, vec![2]);
    }

    #[test]
    fn lost_peer_fails_pending_receive() {
        let (tx, rx) = unbounded();
        let mut mailbox = Mailbox::new(rx);
        tx.send(Delivery::Lost {
            source: 4,
            reason: "reset".into(),
        })
        .unwrap();
        let err = mailbox.take(Some(4), Tag::Downward).unwrap_err();
        assert!(matches!(err, CommError::PeerLost { peer: 4, .. }), "{err}");
    }

    #[test]
    fn queued_message_wins_over_later_loss() {
        let (tx, rx) = unbounded();
        let mut mailbox = Mailbox::new(rx);
        tx.send(message(4, Tag::Gather, 7)).unwrap();
        tx.send(Delivery::Lost {
            source: 4,
            reason: "closed".into(),
        })
        .unwrap();
        assert_eq!(mailbox.take(None, Tag::Gather).unwrap().words, vec![7]);
    }

    #[test]
    fn dropped_senders_close_the_mailbox() {
        let (tx, rx) = unbounded::<Delivery>();
        drop(tx);
        let mut mailbox = Mailbox::new(rx);
        assert!(matches!(
            mailbox.take(Some(0), Tag::Upward),
            Err(CommError::MailboxClosed)
        ));
    }
}
