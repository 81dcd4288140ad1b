//! The Raft replica core: election, heartbeats, and log replication.
//!
//! This module implements the single-threaded state machine described in the crate's top-level
//! documentation. A [`Replica`] owns its log, its peer bookkeeping, and a user-supplied
//! [`StateMachine`](crate::state_machine::StateMachine); it is driven entirely by its three
//! public entry points — [`Replica::process`], [`Replica::tick`], and [`Replica::replicate`] —
//! which the embedder is responsible for calling under mutual exclusion.

use rand_core::RngCore;

use crate::errors::ReplicaError;
use crate::log::Log;
use crate::message::{
    AppendEntriesReply, AppendEntriesRequest, Index, LogEntry, Message, NodeId, Rpc, Term, VoteReply, VoteRequest,
};
use crate::state_machine::StateMachine;
use crate::transport::Peer;

const HEARTBEAT_PERIOD: u32 = 10;
const ELECTION_TIMEOUT_MIN: u32 = 100;
const ELECTION_TIMEOUT_MAX: u32 = 500;

/// The role a [`Replica`] currently occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Passively accepts entries from a leader and votes in elections.
    Follower,
    /// Has started an election for a new term and is soliciting votes.
    Candidate,
    /// Replicates entries to followers and drives commitment.
    Leader,
}

/// Tunable timing parameters for a [`Replica`], in ticks.
///
/// The unit of a "tick" is left to the embedder; `tick()` should be called at whatever fixed rate
/// makes these defaults meaningful (e.g. once per millisecond).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// The inclusive-exclusive range `(min, max)` an election timeout is drawn uniformly from.
    pub election_timeout_ticks: (u32, u32),
    /// How many ticks a leader waits between heartbeats.
    pub heartbeat_period_ticks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            election_timeout_ticks: (ELECTION_TIMEOUT_MIN, ELECTION_TIMEOUT_MAX),
            heartbeat_period_ticks: HEARTBEAT_PERIOD,
        }
    }
}

/// A single Raft replica.
///
/// `N` bounds both the replica's log capacity and the number of entries an
/// [`AppendEntriesRequest`] can carry in one message; `SM` is the user's replicated application;
/// `R` is the per-replica randomness source used to stagger election timeouts.
pub struct Replica<'a, SM: StateMachine, R: RngCore, const N: usize> {
    id: NodeId,
    peers: &'a mut [Peer<'a, SM::Operation, N>],
    term: Term,
    vote_count: usize,
    voted_for: NodeId,
    node_state: NodeState,
    heartbeat_timer: u32,
    election_timer: u32,
    log: Log<SM::Operation, N>,
    commit_index: Index,
    state_machine: SM,
    config: Config,
    rng: R,
}

impl<'a, SM: StateMachine, R: RngCore, const N: usize> Replica<'a, SM, R, N> {
    /// Constructs a new replica in the Follower role with an empty log.
    pub fn new(id: NodeId, peers: &'a mut [Peer<'a, SM::Operation, N>], state_machine: SM, config: Config, mut rng: R) -> Self {
        let election_timer = Self::random_election_timeout(&config, &mut rng);
        Self {
            id,
            peers,
            term: 0,
            vote_count: 0,
            voted_for: 0,
            node_state: NodeState::Follower,
            heartbeat_timer: 0,
            election_timer,
            log: Log::default(),
            commit_index: 0,
            state_machine,
            config,
            rng,
        }
    }

    /// Whether this replica currently believes itself to be the leader.
    pub fn is_leader(&self) -> bool {
        self.node_state == NodeState::Leader
    }

    /// This replica's current role.
    pub fn node_state(&self) -> NodeState {
        self.node_state
    }

    /// This replica's current term.
    pub fn term(&self) -> Term {
        self.term
    }

    /// The highest log index this replica has committed.
    pub fn commit_index(&self) -> Index {
        self.commit_index
    }

    /// A read-only view of this replica's log.
    pub fn log(&self) -> &Log<SM::Operation, N> {
        &self.log
    }

    /// This replica's identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// A read-only view of the embedder's state machine.
    pub fn state_machine(&self) -> &SM {
        &self.state_machine
    }

    /// A read-only view of this replica's peer bookkeeping, in whatever order `find_safe_index`
    /// last sorted it.
    pub fn peers(&self) -> &[Peer<'a, SM::Operation, N>] {
        self.peers
    }

    /// Processes one inbound message, returning a reply to send back to its sender, if any.
    pub fn process(&mut self, msg: Message<SM::Operation, N>) -> Option<Message<SM::Operation, N>> {
        match msg.rpc {
            Rpc::VoteRequest(req) => Some(self.process_vote_request(msg.term, msg.from_id, req)),
            Rpc::VoteReply(reply) => {
                self.process_vote_reply(msg.term, reply);
                None
            }
            Rpc::AppendEntriesRequest(req) => Some(self.process_append_entries_request(msg.term, req)),
            Rpc::AppendEntriesReply(reply) => {
                self.process_append_entries_reply(msg.from_id, reply);
                None
            }
        }
    }

    fn process_vote_request(&mut self, msg_term: Term, from_id: NodeId, req: VoteRequest) -> Message<SM::Operation, N> {
        verbose!("got a VoteRequest from {}", from_id);

        let mut vote_granted = false;

        let valid_candidate =
            msg_term > self.term && self.log.last_index() <= req.last_log_index && self.log.last_term() <= req.last_log_term;
        let same_candidate = msg_term == self.term && from_id == self.voted_for;

        if valid_candidate || same_candidate {
            vote_granted = true;
            self.term = msg_term;
            self.voted_for = from_id;
            self.node_state = NodeState::Follower;
            verbose!("granted my vote to {} which has term {}", self.voted_for, self.term);
        }

        Message {
            // Preserved as-is from the source: the reply's term is the candidate's term, even on
            // the branches that deny the vote.
            term: msg_term,
            from_id: self.id,
            rpc: Rpc::VoteReply(VoteReply { vote_granted }),
        }
    }

    fn process_vote_reply(&mut self, msg_term: Term, reply: VoteReply) {
        verbose!("got a VoteReply(granted = {})", reply.vote_granted);

        // Not guarded against a peer granting twice within the same election: a duplicate grant
        // inflates `vote_count`, exactly as in the source.
        if self.node_state != NodeState::Candidate {
            return;
        }

        if reply.vote_granted {
            assert_match!(NodeState::Candidate = self.node_state);
            self.vote_count += 1;
            // Total votes = vote_count + 1 (we also voted for ourselves).
            if 2 * self.vote_count >= self.peers.len() {
                self.become_leader();
            }
        } else if msg_term > self.term {
            self.term = msg_term;
            self.node_state = NodeState::Follower;
            self.voted_for = 0;
            self.reset_election_timer();
        }
    }

    fn process_append_entries_request(
        &mut self,
        msg_term: Term,
        req: AppendEntriesRequest<SM::Operation, N>,
    ) -> Message<SM::Operation, N> {
        self.reset_election_timer();

        if msg_term > self.term {
            self.node_state = NodeState::Follower;
            self.term = msg_term;
        }

        // Requests from an older term are discarded outright.
        if msg_term < self.term {
            return self.append_entries_reject();
        }

        // If the entry described as the previous entry doesn't exist, the follower's log has
        // diverged too far back for this request; discard it so the leader backs off.
        if req.previous_entry_index > 0
            && req.previous_entry_term > 0
            && self.log.find_entry(req.previous_entry_term, req.previous_entry_index).is_none()
        {
            return self.append_entries_reject();
        }

        self.log.merge(&req.entries[..req.count]);

        if req.leader_commit > self.commit_index {
            let new_commit = core::cmp::min(req.leader_commit, self.log.last_index());
            self.commit_log_entries(self.commit_index, new_commit);
            self.commit_index = new_commit;
        }

        Message {
            term: self.term,
            from_id: self.id,
            rpc: Rpc::AppendEntriesReply(AppendEntriesReply {
                success: true,
                last_index: self.log.last_index(),
            }),
        }
    }

    fn append_entries_reject(&self) -> Message<SM::Operation, N> {
        Message {
            term: self.term,
            from_id: self.id,
            rpc: Rpc::AppendEntriesReply(AppendEntriesReply {
                success: false,
                last_index: 0,
            }),
        }
    }

    fn process_append_entries_reply(&mut self, from_id: NodeId, reply: AppendEntriesReply) {
        let peer = match self.peers.iter_mut().find(|peer| peer.id == from_id) {
            Some(peer) => peer,
            None => {
                log::error!("{}", ReplicaError::UnknownPeer(from_id));
                return;
            }
        };

        if reply.success {
            peer.match_index = reply.last_index;
            peer.next_index = reply.last_index + 1;

            let new_commit = self.find_safe_index();
            self.commit_log_entries(self.commit_index, new_commit);
            self.commit_index = new_commit;
        } else {
            // No lower bound: this can walk below 1, preserved as-is from the source.
            peer.next_index -= 1;
        }
    }

    /// Advances this replica's internal timers by one tick, sending heartbeats or starting an
    /// election as appropriate.
    pub fn tick(&mut self) {
        if self.node_state == NodeState::Leader {
            self.tick_heartbeat();
        } else {
            self.tick_election();
        }
    }

    fn tick_heartbeat(&mut self) {
        if self.heartbeat_timer > 0 {
            self.heartbeat_timer -= 1;
            return;
        }

        verbose!("sending heartbeat");

        let term = self.term;
        let id = self.id;
        let commit_index = self.commit_index;
        let entries = self.log.entries();

        for peer in self.peers.iter_mut() {
            let mut msg = AppendEntriesRequest::<SM::Operation, N>::default();
            msg.leader_commit = commit_index;

            for (j, entry) in entries.iter().enumerate() {
                if entry.index >= peer.next_index {
                    for k in j..entries.len() {
                        msg.entries[msg.count] = entries[k];
                        msg.count += 1;
                    }
                    break;
                }
                msg.previous_entry_term = entry.term;
                msg.previous_entry_index = entry.index;
            }

            peer.send(Message {
                term,
                from_id: id,
                rpc: Rpc::AppendEntriesRequest(msg),
            });
        }

        self.heartbeat_timer = self.config.heartbeat_period_ticks - 1;
    }

    fn tick_election(&mut self) {
        if self.election_timer > 0 {
            self.election_timer -= 1;
        } else {
            self.start_election();
            self.reset_election_timer();
        }
    }

    fn reset_election_timer(&mut self) {
        self.election_timer = Self::random_election_timeout(&self.config, &mut self.rng);
    }

    fn random_election_timeout(config: &Config, rng: &mut R) -> u32 {
        let (min, max) = config.election_timeout_ticks;
        min + rng.next_u32() % (max - min)
    }

    /// Begins a new election for the next term, voting for self and requesting votes from every
    /// peer. No-op if this replica already believes itself to be the leader.
    pub fn start_election(&mut self) {
        if self.node_state == NodeState::Leader {
            return;
        }

        log::info!("starting election...");
        self.node_state = NodeState::Candidate;
        self.term += 1;
        self.vote_count = 0;
        self.voted_for = self.id;

        let msg = Message {
            term: self.term,
            from_id: self.id,
            rpc: Rpc::VoteRequest(VoteRequest {
                last_log_index: self.log.last_index(),
                last_log_term: self.log.last_term(),
            }),
        };

        for peer in self.peers.iter_mut() {
            peer.send(msg);
        }
    }

    /// Appends a new operation to this replica's log at the current term.
    ///
    /// Performs no check that this replica is actually the leader: callers are responsible for
    /// only replicating through a leader, preserved as a known gap from the source rather than
    /// silently enforced here.
    pub fn replicate(&mut self, operation: SM::Operation) {
        let entry = LogEntry {
            operation,
            term: self.term,
            index: self.log.last_index() + 1,
        };
        self.log.append(entry);
    }

    /// Transitions this replica to the Leader role, resetting per-peer replication state.
    pub fn become_leader(&mut self) {
        self.node_state = NodeState::Leader;
        let last_index = self.log.last_index();
        for peer in self.peers.iter_mut() {
            // Preserved as-is from the source: not `last_index + 1`.
            peer.next_index = last_index;
            peer.match_index = 0;
        }
    }

    fn find_safe_index(&mut self) -> Index {
        // Sorting the peer slice in place is an observable side effect, preserved from the
        // source (which sorted an array of peer pointers via qsort for the same purpose).
        self.peers.sort_unstable_by(|a, b| b.match_index.cmp(&a.match_index));

        let median = (self.peers.len() / 2).saturating_sub(1);
        let n = self.peers.get(median).map(|peer| peer.match_index).unwrap_or(0);

        if self.log.find_entry(self.term, n).is_some() {
            n
        } else {
            self.commit_index
        }
    }

    fn commit_log_entries(&mut self, old_index: Index, new_index: Index) {
        let entries = self.log.entries();
        let mut i = entries.iter().take_while(|entry| entry.index <= old_index).count();

        let mut commit_index = old_index;
        while commit_index < new_index {
            commit_index += 1;
            self.state_machine.apply(entries[i].operation);
            i += 1;
        }
    }
}
