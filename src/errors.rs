//! Error types returned by this crate.

use core::fmt;

use crate::message::NodeId;

/// An error returned by a fallible [`Replica`](crate::core::Replica) operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaError {
    /// A caller referenced a peer id that isn't part of this replica's configured group.
    UnknownPeer(NodeId),
}

impl fmt::Display for ReplicaError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaError::UnknownPeer(id) => write!(fmt, "unknown peer id {}", id),
        }
    }
}
