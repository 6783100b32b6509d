//! Sluice Core - buffering, node threads, and worker-pool scheduling
//!
//! This crate provides the runtime under a sluice signal graph: bounded
//! multi-reader ring buffers, one thread per node, cooperative cancellation,
//! and an order-preserving scheduler that fans a stateless stage out across
//! local or remote workers.
//!
//! # Core Abstractions
//!
//! ## Buffering
//!
//! - [`RingBuffer`] - Power-of-two circular store, one writer, many readers
//! - [`ScratchView`] - Exclusive write window, consumed by commit or discard
//! - [`BufferData`] - Owned block of samples that can leave the ring
//! - [`Trapdoor`] - Cancellation token checked by every blocking wait
//!
//! Segment boundaries ("plungers") travel in-band: a reader is told how far
//! it may read before the next boundary and must skip it explicitly.
//!
//! ## Graphs
//!
//! - [`Processor`] - Compute routine driven by a node thread
//! - [`Node`] - Graph vertex owning a thread and its port wiring
//! - [`Group`] - Start, stop, and reset a set of nodes together
//!
//! ## Stages and Scheduling
//!
//! - [`StatelessStage`] - Re-entrant `(in, step, out)` chunk transform
//! - [`Combination`] - Two compatible stages fused into one
//! - [`WorkerPool`] - Processor running one stage on many workers, in order
//! - [`Coupling`] - How the pool talks to one worker
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_core::{Group, Node, Properties};
//!
//! let source = Node::new("ramp", Box::new(ramp));
//! let sink = Node::new("collect", Box::new(collector));
//! source.configure(&Properties::new())?;
//! sink.configure(&Properties::new())?;
//! source.output(0).connect(&sink.input(0))?;
//!
//! let mut group = Group::new();
//! group.add(source)?;
//! group.add(sink)?;
//! group.go(true)?;
//! ```

pub mod combination;
pub mod error;
pub mod graph;
pub mod pool;
pub mod properties;
pub mod ring;
pub mod signal;
pub mod stage;
pub mod trapdoor;
pub mod view;

pub use combination::{Combination, NEXT_PREFIX};
pub use error::{Bail, ErrorKind, GraphError, NodeFailure, StageError, StartError};
pub use graph::{
    Arity, Connection, DEFAULT_BUFFER_WORDS, DEFAULT_STOP_TIMEOUT, Flow, Group, InputPort, Io, LinkMode, Node,
    NodeConfig, NodeState, OutputPort, PortSpec, Processor,
};
pub use pool::{Coupling, CouplingError, LocalCoupling, PoolHandle, PoolOptions, PoolStats, WorkerPool, WorkerStats};
pub use properties::{Properties, Value};
pub use ring::{ReaderId, RingBuffer, TypeSlot};
pub use signal::SignalType;
pub use stage::{StageFactory, StatelessStage, Window};
pub use trapdoor::{Trapdoor, TrapdoorId};
pub use view::{BufferData, Frames, FramesMut, ScratchView};
