//! Raft consensus algorithm implementation.
//!
//! Raft is a consensus algorithm which replicates a strongly-consistent distributed log of
//! entries amongst a group of peers. It is fault-tolerant, allowing replication to continue while
//! a majority of peers can still communicate with each other. This crate implements the core
//! replica state machine — leader election, log replication, and commitment — as a `no_std`,
//! allocation-free library with no opinion on transport, persistence, or wire format; membership
//! changes and snapshotting are not implemented.
//!
//! The replica is driven in three ways:
//!
//! * When a message arrives from a peer: [`process`](core::Replica::process) is called, which may
//!   return a reply to send back to the sender.
//! * Every time a fixed amount of time has elapsed: [`tick`](core::Replica::tick) is called, which
//!   drives heartbeats (while leader) or election timeouts (otherwise), sending any resulting
//!   messages directly through each peer's [`Transport`](transport::Transport).
//! * When the embedder wants to replicate a new operation: [`replicate`](core::Replica::replicate)
//!   is called on the believed leader.
//!
//! Once a log entry is committed — replicated to a majority of peers and known to belong to the
//! current leader's term — it is applied exactly once to the embedder's
//! [`StateMachine`](state_machine::StateMachine).
//!
//! # Example
//!
//! ```no_run
//! use raft::core::{Config, Replica};
//! use raft::message::Message;
//! use raft::state_machine::StateMachine;
//! use raft::transport::{Peer, Transport};
//! use rand_chacha::ChaChaRng;
//! use rand_core::SeedableRng;
//!
//! const LOG_SIZE: usize = 16;
//!
//! struct Counter(u64);
//!
//! impl StateMachine for Counter {
//!     type Operation = u64;
//!     fn apply(&mut self, operation: u64) {
//!         self.0 += operation;
//!     }
//! }
//!
//! struct ChannelTransport {
//!     outbox: std::sync::mpsc::Sender<Message<u64, LOG_SIZE>>,
//! }
//!
//! impl Transport<u64, LOG_SIZE> for ChannelTransport {
//!     fn send(&mut self, msg: Message<u64, LOG_SIZE>) {
//!         let _ = self.outbox.send(msg);
//!     }
//! }
//!
//! let (tx, _rx) = std::sync::mpsc::channel();
//! let mut transport = ChannelTransport { outbox: tx };
//! let mut peers = [Peer::new(2, &mut transport)];
//!
//! let mut replica = Replica::new(
//!     1,
//!     &mut peers,
//!     Counter(0),
//!     Config::default(),
//!     ChaChaRng::seed_from_u64(1),
//! );
//!
//! // Drive the election/heartbeat timer; once leader, replicate an operation.
//! replica.tick();
//! if replica.is_leader() {
//!     replica.replicate(42);
//! }
//! ```

#![no_std]
#![allow(unused_parens)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod core;
pub mod errors;
pub mod log;
pub mod message;
pub mod state_machine;
pub mod transport;
