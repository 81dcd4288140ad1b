//! Peer bookkeeping and outbound message delivery.

use crate::message::{Index, Message, NodeId};

/// A destination a [`Replica`](crate::core::Replica) can send messages to.
///
/// Implementations forward a message to the corresponding remote replica by whatever means the
/// embedder provides (a channel, a socket, an in-process queue in tests). `send` takes `&mut
/// self` rather than `&self` so that transports backed by buffered queues don't need interior
/// mutability, but it must not block indefinitely: the replica calls it from inside `tick` and
/// `process`.
pub trait Transport<Op, const N: usize> {
    /// Delivers `msg` to the peer this transport is attached to.
    fn send(&mut self, msg: Message<Op, N>);
}

/// A known peer replica, together with the leader-only bookkeeping used to drive replication.
pub struct Peer<'a, Op, const N: usize> {
    /// The peer's identifier.
    pub id: NodeId,
    /// The index of the highest log entry known to be replicated on this peer.
    pub match_index: Index,
    /// The index of the next log entry to send to this peer.
    pub next_index: Index,
    transport: &'a mut dyn Transport<Op, N>,
}

impl<'a, Op, const N: usize> Peer<'a, Op, N> {
    /// Constructs a new peer with zeroed replication bookkeeping.
    pub fn new(id: NodeId, transport: &'a mut dyn Transport<Op, N>) -> Self {
        Self {
            id,
            match_index: 0,
            next_index: 0,
            transport,
        }
    }

    /// Sends a message to this peer.
    pub fn send(&mut self, msg: Message<Op, N>) {
        self.transport.send(msg);
    }
}
