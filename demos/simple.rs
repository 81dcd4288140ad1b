//! A simple example from the `raft` crate's crate-level documentation, simulating five peers
//! exchanging messages over an in-process queue until an operation commits everywhere.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand_chacha::ChaChaRng;
use rand_core::SeedableRng;

use raft::core::{Config, Replica};
use raft::message::{Message, NodeId};
use raft::state_machine::StateMachine;
use raft::transport::{Peer, Transport};

const LOG_SIZE: usize = 8;
type Op = u32;

#[derive(Default)]
struct PrintingStateMachine {
    id: NodeId,
    applied: Vec<Op>,
}

impl StateMachine for PrintingStateMachine {
    type Operation = Op;

    fn apply(&mut self, operation: Op) {
        println!("peer {} applied {}", self.id, operation);
        self.applied.push(operation);
    }
}

type Envelope = (NodeId, Message<Op, LOG_SIZE>);

struct QueueTransport {
    to: NodeId,
    queue: Rc<RefCell<VecDeque<Envelope>>>,
}

impl Transport<Op, LOG_SIZE> for QueueTransport {
    fn send(&mut self, msg: Message<Op, LOG_SIZE>) {
        self.queue.borrow_mut().push_back((self.to, msg));
    }
}

fn main() {
    env_logger::init();

    const PEER_COUNT: usize = 5;
    let queue: Rc<RefCell<VecDeque<Envelope>>> = Rc::new(RefCell::new(VecDeque::new()));

    let mut transports: Vec<Vec<QueueTransport>> = (1..=PEER_COUNT as NodeId)
        .map(|node_id| {
            (1..=PEER_COUNT as NodeId)
                .filter(|&peer_id| peer_id != node_id)
                .map(|to| QueueTransport { to, queue: queue.clone() })
                .collect()
        })
        .collect();

    let mut peers: Vec<Vec<Peer<'_, Op, LOG_SIZE>>> = transports
        .iter_mut()
        .map(|node_transports| node_transports.iter_mut().map(|t| Peer::new(t.to, t)).collect())
        .collect();

    let mut random = ChaChaRng::seed_from_u64(0);
    let config = Config {
        election_timeout_ticks: (10, 20),
        heartbeat_period_ticks: 1,
    };

    let mut nodes: Vec<Replica<'_, PrintingStateMachine, ChaChaRng, LOG_SIZE>> = peers
        .iter_mut()
        .enumerate()
        .map(|(i, node_peers)| {
            let id = (i + 1) as NodeId;
            Replica::new(
                id,
                node_peers.as_mut_slice(),
                PrintingStateMachine { id, applied: Vec::new() },
                config,
                ChaChaRng::seed_from_u64(random.next_u64()),
            )
        })
        .collect();

    let mut appended = false;

    loop {
        for node in nodes.iter_mut() {
            node.tick();
        }

        loop {
            let next = queue.borrow_mut().pop_front();
            let (to, msg) = match next {
                Some(envelope) => envelope,
                None => break,
            };
            let from_id = msg.from_id;
            let index = (to - 1) as usize;
            if let Some(reply) = nodes[index].process(msg) {
                queue.borrow_mut().push_back((from_id, reply));
            }
        }

        if !appended {
            if let Some(leader) = nodes.iter_mut().find(|node| node.is_leader()) {
                println!("peer {} appending to the log", leader.id());
                leader.replicate(42);
                appended = true;
            }
        }

        if appended && nodes.iter().all(|node| node.state_machine().applied == vec![42]) {
            break;
        }
    }
}
