//! Nodes, wiring, and whole-graph control.
//!
//! A graph is a set of [`Node`]s, each driving one [`Processor`] on its own
//! thread, joined by ring-buffer wires created through
//! [`OutputPort::connect`], [`OutputPort::split`] and [`OutputPort::share`].
//! A [`Group`] starts and stops nodes together and aggregates start-up
//! failures.
//!
//! # Architecture
//!
//! ```text
//!   Node (thread)            Node (thread)
//!  ┌─────────────┐  ring   ┌─────────────┐
//!  │ Processor   │ ──────▶ │ Processor   │
//!  │  process(io)│         │  process(io)│
//!  └─────────────┘         └─────────────┘
//! ```
//!
//! Types flow downstream at start-up: each node waits for its inputs'
//! types, asks its processor for output types, and publishes them on its
//! output buffers, sizing those buffers in the same step.

mod connection;
mod group;
mod io;
mod node;
mod processor;

pub use connection::{Connection, InputPort, LinkMode, OutputPort};
pub use group::Group;
pub use io::Io;
pub use node::{DEFAULT_BUFFER_WORDS, DEFAULT_STOP_TIMEOUT, Node, NodeConfig, NodeState};
pub use processor::{Arity, Flow, PortSpec, Processor};
