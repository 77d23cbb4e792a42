//! One worker per OS process, joined by a full mesh of TCP connections.
//!
//! Rank `r` listens on `peers[r]`, dials every lower rank and accepts every
//! higher one. Each dialer opens with its rank as a little-endian `u32`.
//! A reader thread per connection decodes frames into the rank's mailbox.
//!
//! Frame layout:
//!
//! ```text
//! [tag: u8][word count: u32 LE][words: u64 LE ...]
//! ```

use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, trace};

use super::mailbox::{Delivery, Envelope};
use super::{CommError, Endpoint, Link, Rank, Tag};

const HEADER_LEN: usize = 5;
const DIAL_RETRY: Duration = Duration::from_millis(20);

pub fn encode_frame(tag: Tag, words: &[u64]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + words.len() * 8);
    frame.push(tag.as_u8());
    frame.extend_from_slice(&(words.len() as u32).to_le_bytes());
    for word in words {
        frame.extend_from_slice(&word.to_le_bytes());
    }
    frame
}

/// Read one frame; `Ok(None)` on a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R, peer: Rank) -> Result<Option<(Tag, Vec<u64>)>, CommError> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let tag = Tag::from_u8(header[0]).ok_or_else(|| CommError::Malformed {
        peer,
        reason: format!("unknown tag {}", header[0]),
    })?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;

    let mut payload = vec![0u8; len * 8];
    reader.read_exact(&mut payload).map_err(|err| CommError::Malformed {
        peer,
        reason: format!("truncated payload of {len} words: {err}"),
    })?;
    let words = payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            u64::from_le_bytes(bytes)
        })
        .collect();
    Ok(Some((tag, words)))
}

#[derive(Debug)]
pub struct TcpLink {
    peer: Rank,
    stream: TcpStream,
}

impl TcpLink {
    fn start(peer: Rank, stream: TcpStream, deliveries: Sender<Delivery>) -> Result<Self, CommError> {
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;
        // The reader exits on its own once the peer closes its side.
        thread::Builder::new()
            .name(format!("torus-rx-{peer}"))
            .spawn(move || pump_frames(peer, read_half, deliveries))?;
        Ok(Self { peer, stream })
    }
}

impl Link for TcpLink {
    fn post(&mut self, tag: Tag, words: &[u64]) -> Result<(), CommError> {
        trace!(peer = self.peer, ?tag, words = words.len(), "send frame");
        self.stream
            .write_all(&encode_frame(tag, words))
            .map_err(|err| CommError::PeerLost {
                peer: self.peer,
                reason: err.to_string(),
            })
    }

    fn close(mut self) -> Result<(), CommError> {
        self.stream.flush()?;
        match self.stream.shutdown(Shutdown::Write) {
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            other => Ok(other?),
        }
    }

    fn abandon(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Forward frames from `peer` until it closes. A close that is not preceded
/// by a `Shutdown` frame is reported as a lost peer.
fn pump_frames(peer: Rank, stream: TcpStream, deliveries: Sender<Delivery>) {
    let mut reader = BufReader::new(stream);
    let mut finalized = false;
    loop {
        let delivery = match read_frame(&mut reader, peer) {
            Ok(Some((tag, words))) => {
                finalized |= tag == Tag::Shutdown;
                Delivery::Message(Envelope {
                    source: peer,
                    tag,
                    words,
                })
            }
            Ok(None) if finalized => return,
            Ok(None) => Delivery::Lost {
                source: peer,
                reason: "connection closed before shutdown".to_string(),
            },
            Err(err) => Delivery::Lost {
                source: peer,
                reason: err.to_string(),
            },
        };
        let lost = matches!(delivery, Delivery::Lost { .. });
        if deliveries.send(delivery).is_err() || lost {
            return;
        }
    }
}

pub type TcpEndpoint = Endpoint<TcpLink>;

/// Join the mesh described by `peers` as `rank`, listening on `peers[rank]`.
///
/// Dialing lower ranks retries until `timeout` elapses, so processes may
/// start in any order.
pub fn connect(rank: Rank, peers: &[SocketAddr], timeout: Duration) -> Result<TcpEndpoint, CommError> {
    let addr = *peers.get(rank).ok_or(CommError::InvalidRank {
        peer: rank,
        size: peers.len(),
    })?;
    let listener = TcpListener::bind(addr)
        .map_err(|err| CommError::Handshake(format!("rank {rank} cannot listen on {addr}: {err}")))?;
    connect_with_listener(rank, listener, peers, timeout)
}

/// [`connect`] on an already bound listener for `peers[rank]`.
pub fn connect_with_listener(
    rank: Rank,
    listener: TcpListener,
    peers: &[SocketAddr],
    timeout: Duration,
) -> Result<TcpEndpoint, CommError> {
    let size = peers.len();
    if rank >= size {
        return Err(CommError::InvalidRank { peer: rank, size });
    }
    let deadline = Instant::now() + timeout;
    let mut streams: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();

    for (peer, addr) in peers.iter().enumerate().take(rank) {
        let mut stream = dial(*addr, deadline)?;
        stream.write_all(&(rank as u32).to_le_bytes())?;
        debug!(rank, peer, %addr, "dialed");
        streams[peer] = Some(stream);
    }

    for _ in rank + 1..size {
        let (mut stream, addr) = listener.accept()?;
        let mut hello = [0u8; 4];
        stream.read_exact(&mut hello)?;
        let peer = u32::from_le_bytes(hello) as usize;
        if peer <= rank || peer >= size || streams[peer].is_some() {
            return Err(CommError::Handshake(format!(
                "rank {rank} got an unexpected hello from rank {peer} at {addr}"
            )));
        }
        debug!(rank, peer, %addr, "accepted");
        streams[peer] = Some(stream);
    }

    let (loopback, inbox) = unbounded();
    let links = streams
        .into_iter()
        .enumerate()
        .map(|(peer, stream)| {
            stream
                .map(|stream| TcpLink::start(peer, stream, loopback.clone()))
                .transpose()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Endpoint::new(rank, links, loopback, inbox))
}

fn dial(addr: SocketAddr, deadline: Instant) -> Result<TcpStream, CommError> {
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) if Instant::now() < deadline && retryable(&err) => thread::sleep(DIAL_RETRY),
            Err(err) => {
                return Err(CommError::Handshake(format!("cannot reach {addr}: {err}")));
            }
        }
    }
}

fn retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Pick `count` free loopback addresses by binding port 0 and releasing it.
///
/// The ports are free when this returns, not when the workers bind them:
/// another process can take one in between, and the worker on that port then
/// fails with a `Handshake` error. In-process callers should bind their own
/// listeners and use [`connect_with_listener`].
pub fn reserve_loopback_peers(count: usize) -> io::Result<Vec<SocketAddr>> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind(("127.0.0.1", 0)))
        .collect::<io::Result<Vec<_>>>()?;
    listeners.iter().map(TcpListener::local_addr).collect()
}
