//! Raft message types exchanged between replicas.
//!
//! This module provides the data types sent between Raft replicas. The top-level type is
//! [`Message`], a small envelope around one of the four RPC payloads in [`Rpc`]. Unlike the
//! teacher crate this one is descended from, no wire format is imposed here: these are plain
//! in-memory value types, and serialization (if any) is left to the embedder.

use core::fmt;

/// A node identifier. 0 is never assigned to a real peer; it is used as the "no vote" sentinel
/// in [`crate::core::Replica`].
pub type NodeId = i32;

/// A Raft leadership term. Monotonically non-decreasing for a given replica.
pub type Term = i32;

/// A 1-based position in a [`Log`](crate::log::Log). 0 denotes "no entry".
pub type Index = i32;

/// One entry in a replica's log: a user operation tagged with the term and index at which it
/// was appended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogEntry<Op> {
    /// The operation to apply to the state machine once this entry is committed.
    pub operation: Op,
    /// The term of the leader that appended this entry.
    pub term: Term,
    /// The 1-based index of this entry in the log.
    pub index: Index,
}

/// A message sent between Raft replicas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message<Op, const N: usize> {
    /// The greatest term seen by the sender.
    pub term: Term,
    /// The id of the replica that sent this message.
    pub from_id: NodeId,
    /// The RPC payload carried by this message.
    pub rpc: Rpc<Op, N>,
}

impl<Op: Default + Copy, const N: usize> Default for Message<Op, N> {
    fn default() -> Self {
        Self {
            term: 0,
            from_id: 0,
            rpc: Rpc::default(),
        }
    }
}

/// The RPC payload of a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rpc<Op, const N: usize> {
    /// A request to obtain leadership for the sender's term.
    VoteRequest(VoteRequest),
    /// A reply granting or denying a [`VoteRequest`].
    VoteReply(VoteReply),
    /// A request to append entries (possibly none, as a heartbeat) to a follower's log.
    AppendEntriesRequest(AppendEntriesRequest<Op, N>),
    /// A reply to an [`AppendEntriesRequest`].
    AppendEntriesReply(AppendEntriesReply),
}

impl<Op: Default + Copy, const N: usize> Default for Rpc<Op, N> {
    fn default() -> Self {
        Rpc::VoteRequest(VoteRequest::default())
    }
}

/// A request to obtain leadership for the candidate's term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteRequest {
    /// The index of the last entry in the candidate's log.
    pub last_log_index: Index,
    /// The term of the last entry in the candidate's log.
    pub last_log_term: Term,
}

/// A reply granting or denying a [`VoteRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteReply {
    /// Whether the vote was granted.
    pub vote_granted: bool,
}

/// A request to append entries to a follower's log. With `count == 0` this serves purely as a
/// heartbeat.
#[derive(Clone, Copy, Debug)]
pub struct AppendEntriesRequest<Op, const N: usize> {
    /// How many of [`entries`](Self::entries) are meaningful; the rest are zeroed padding.
    pub count: usize,
    /// The index of the highest log entry known by the leader to be committed.
    pub leader_commit: Index,
    /// The term of the entry immediately preceding the first entry in [`entries`](Self::entries).
    pub previous_entry_term: Term,
    /// The index of the entry immediately preceding the first entry in [`entries`](Self::entries).
    pub previous_entry_index: Index,
    /// Entries to append, starting at `previous_entry_index + 1`. Only the first `count` slots
    /// are meaningful.
    pub entries: [LogEntry<Op>; N],
}

impl<Op: Default + Copy, const N: usize> Default for AppendEntriesRequest<Op, N> {
    fn default() -> Self {
        Self {
            count: 0,
            leader_commit: 0,
            previous_entry_term: 0,
            previous_entry_index: 0,
            entries: [LogEntry::default(); N],
        }
    }
}

impl<Op: PartialEq, const N: usize> PartialEq for AppendEntriesRequest<Op, N> {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.leader_commit == other.leader_commit
            && self.previous_entry_term == other.previous_entry_term
            && self.previous_entry_index == other.previous_entry_index
            && self.entries[..self.count] == other.entries[..other.count]
    }
}

impl<Op: Eq, const N: usize> Eq for AppendEntriesRequest<Op, N> {}

/// A reply to an [`AppendEntriesRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendEntriesReply {
    /// Whether the request was accepted.
    pub success: bool,
    /// The index of the last entry in the replier's log after processing the request.
    pub last_index: Index,
}

//
// Display impls, for diagnostic logging
//

impl<Op, const N: usize> fmt::Display for Message<Op, N> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "[term {} from {}] {}", self.term, self.from_id, &self.rpc)
    }
}

impl<Op, const N: usize> fmt::Display for Rpc<Op, N> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rpc::VoteRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::VoteReply(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendEntriesRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendEntriesReply(msg) => fmt::Display::fmt(msg, fmt),
        }
    }
}

impl fmt::Display for VoteRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("VoteRequest")
            .field("last_log_index", &self.last_log_index)
            .field("last_log_term", &self.last_log_term)
            .finish()
    }
}

impl fmt::Display for VoteReply {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("VoteReply")
            .field("vote_granted", &self.vote_granted)
            .finish()
    }
}

impl<Op, const N: usize> fmt::Display for AppendEntriesRequest<Op, N> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("AppendEntriesRequest")
            .field("count", &self.count)
            .field("leader_commit", &self.leader_commit)
            .field("previous_entry_term", &self.previous_entry_term)
            .field("previous_entry_index", &self.previous_entry_index)
            .finish()
    }
}

impl fmt::Display for AppendEntriesReply {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("AppendEntriesReply")
            .field("success", &self.success)
            .field("last_index", &self.last_index)
            .finish()
    }
}
