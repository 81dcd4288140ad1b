#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand_chacha::ChaChaRng;
use rand_core::{RngCore, SeedableRng};

use raft::core::{Config, Replica};
use raft::message::{Message, NodeId};
use raft::state_machine::StateMachine;
use raft::transport::{Peer, Transport};

/// Log/message capacity used throughout the test suite.
pub const LOG_SIZE: usize = 8;

/// The operation type replicated in tests: an opaque tag applied to a [`RecordingStateMachine`].
pub type Op = u32;

pub type TestMessage = Message<Op, LOG_SIZE>;
pub type TestReplica<'a> = Replica<'a, RecordingStateMachine, ChaChaRng, LOG_SIZE>;

pub const CONFIG: Config = Config {
    election_timeout_ticks: (10, 20),
    heartbeat_period_ticks: 3,
};
const RANDOM_SEED: u64 = 0;
const MAX_TICKS: u32 = 100_000;

pub fn init_random() -> ChaChaRng {
    ChaChaRng::seed_from_u64(RANDOM_SEED)
}

/// A [`StateMachine`] that just records every operation applied to it, in commit order.
#[derive(Default)]
pub struct RecordingStateMachine {
    pub applied: Vec<Op>,
}

impl StateMachine for RecordingStateMachine {
    type Operation = Op;

    fn apply(&mut self, operation: Op) {
        self.applied.push(operation);
    }
}

/// A [`Transport`] that records every message sent through it, for tests that exercise a single
/// replica's `process`/`tick` behavior without needing a full multi-node simulation.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Vec<TestMessage>,
}

impl Transport<Op, LOG_SIZE> for RecordingTransport {
    fn send(&mut self, msg: TestMessage) {
        self.sent.push(msg);
    }
}

type Envelope = (NodeId, TestMessage);

/// A [`Transport`] that, instead of recording locally, enqueues onto a queue shared by an entire
/// [`TestGroup`], tagged with the id of the peer it's addressed to.
pub struct QueueTransport {
    to: NodeId,
    queue: Rc<RefCell<VecDeque<Envelope>>>,
}

impl Transport<Op, LOG_SIZE> for QueueTransport {
    fn send(&mut self, msg: TestMessage) {
        self.queue.borrow_mut().push_back((self.to, msg));
    }
}

/// Builds the per-node transport objects for a group of `count` nodes (ids `1..=count`), sharing
/// one message queue. Node `i`'s transports exclude a transport to itself.
pub fn build_transports(count: usize, queue: &Rc<RefCell<VecDeque<Envelope>>>) -> Vec<Vec<QueueTransport>> {
    (1..=count as NodeId)
        .map(|node_id| {
            (1..=count as NodeId)
                .filter(|&peer_id| peer_id != node_id)
                .map(|to| QueueTransport {
                    to,
                    queue: queue.clone(),
                })
                .collect()
        })
        .collect()
}

/// Wraps each node's transports into [`Peer`]s, ready to hand to [`TestGroup::new`].
pub fn build_peers(transports: &mut [Vec<QueueTransport>]) -> Vec<Vec<Peer<'_, Op, LOG_SIZE>>> {
    transports
        .iter_mut()
        .map(|node_transports| node_transports.iter_mut().map(|t| Peer::new(t.to, t)).collect())
        .collect()
}

/// A simulated group of replicas exchanging messages over a shared queue, driven tick by tick.
pub struct TestGroup<'a> {
    pub nodes: Vec<TestReplica<'a>>,
    pub tick: u32,
    queue: Rc<RefCell<VecDeque<Envelope>>>,
}

impl<'a> TestGroup<'a> {
    pub fn new(peers: &'a mut [Vec<Peer<'a, Op, LOG_SIZE>>], queue: Rc<RefCell<VecDeque<Envelope>>>, random: &mut impl RngCore) -> Self {
        let nodes = peers
            .iter_mut()
            .enumerate()
            .map(|(i, node_peers)| {
                Replica::new(
                    (i + 1) as NodeId,
                    node_peers.as_mut_slice(),
                    RecordingStateMachine::default(),
                    CONFIG,
                    ChaChaRng::seed_from_u64(random.next_u64()),
                )
            })
            .collect();
        Self { nodes, tick: 0, queue }
    }

    /// Delivers every currently-queued message, routing any reply back to its sender. Newly
    /// queued replies are delivered too, within the same call.
    pub fn deliver_all(&mut self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let (to, msg) = match next {
                Some(envelope) => envelope,
                None => break,
            };
            let from_id = msg.from_id;
            let index = (to - 1) as usize;
            if let Some(node) = self.nodes.get_mut(index) {
                if let Some(reply) = node.process(msg) {
                    self.queue.borrow_mut().push_back((from_id, reply));
                }
            } else {
                log::warn!("message addressed to unknown node {}", to);
            }
        }
    }

    fn advance_one_tick(&mut self) {
        self.tick += 1;
        for node in &mut self.nodes {
            node.tick();
        }
        self.deliver_all();
    }

    pub fn run_for(&mut self, ticks: u32) -> &mut Self {
        self.run_for_inspect(ticks, |_| ())
    }

    pub fn run_for_inspect(&mut self, ticks: u32, mut fun: impl FnMut(&mut Self)) -> &mut Self {
        for _ in 0..ticks {
            self.advance_one_tick();
            fun(self);
        }
        self
    }

    pub fn run_until(&mut self, mut until_fun: impl FnMut(&mut Self) -> bool) -> &mut Self {
        let mut ticks_remaining = MAX_TICKS;
        while !until_fun(self) {
            ticks_remaining = ticks_remaining
                .checked_sub(1)
                .expect("condition failed after maximum simulation length");
            self.advance_one_tick();
        }
        self
    }

    /// Directly starts an election on the given node (bypassing the election timer) and
    /// delivers the resulting messages.
    pub fn start_election_on(&mut self, node_idx: usize) -> &mut Self {
        self.nodes[node_idx].start_election();
        self.deliver_all();
        self
    }

    pub fn has_leader(&self) -> bool {
        self.nodes.iter().any(|node| node.is_leader())
    }

    pub fn leader_idx(&self) -> Option<usize> {
        self.nodes.iter().position(|node| node.is_leader())
    }

    pub fn inspect(&mut self, fun: impl FnOnce(&Self)) -> &mut Self {
        fun(self);
        self
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
