//! Graph vertices and the threads that drive them.
//!
//! A [`Node`] owns one [`Processor`], its port wiring, and (while running)
//! one OS thread. The thread settles types with upstream peers, publishes
//! output types, then calls [`Processor::process`] until the node is stopped
//! or the processor finishes.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --start--> Initializing --types ok--> Running --stop--> Stopping --> Stopped
//!                               |
//!                               +--failure--> Error(kind)
//! ```
//!
//! [`Node::stop`] is cooperative: it opens the node's trapdoor on every
//! buffer the thread might be parked on and joins it. A thread that does not
//! exit within the stop timeout is detached and reported.
//!
//! # Plungers
//!
//! When every input sits on a plunger the thread skips one plunger per
//! input, calls [`Processor::on_plunger`], and inserts a plunger on every
//! output. If the processor stops making progress while only some inputs
//! sit on a plunger, the other inputs are drained up to their next plunger
//! so segments stay aligned.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};

use crate::error::{Bail, ErrorKind, GraphError};
use crate::properties::Properties;
use crate::ring::{ReaderId, RingBuffer, TypeSlot};
use crate::trapdoor::Trapdoor;

use super::connection::{InputPort, LinkMode, OutputPort};
use super::io::{InputEnd, Io};
use super::processor::{Flow, PortSpec, Processor};

/// Default buffer size in words when no peer asks for more.
pub const DEFAULT_BUFFER_WORDS: usize = 65_536;

/// How long [`Node::stop`] waits for the thread before detaching it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(20);

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Never started.
    #[default]
    Uninitialized,
    /// Thread spawned, negotiating types.
    Initializing,
    /// Processing.
    Running,
    /// Stop requested, thread unwinding.
    Stopping,
    /// Stopped; may be started again.
    Stopped,
    /// Failed to start, or failed while running.
    Error(ErrorKind),
}

/// A node's configuration, possibly waiting on a peer for its port count.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    /// Port counts depend on a peer; resolve with
    /// [`Node::resolve_multiplicity`] or [`Node::connect_all`].
    Pending {
        /// Properties the processor was configured with.
        properties: Properties,
        /// The declared, partly deferred, ports.
        spec: PortSpec,
    },
    /// Fully configured.
    Resolved(PortSpec),
}

pub(crate) struct InputLink {
    pub(crate) ring: Arc<RingBuffer>,
    pub(crate) reader: ReaderId,
    pub(crate) source: Weak<NodeShared>,
    pub(crate) source_port: usize,
    pub(crate) mode: LinkMode,
}

pub(crate) struct SinkRef {
    pub(crate) node: Weak<NodeShared>,
    pub(crate) port: usize,
}

#[derive(Default)]
pub(crate) struct OutputWire {
    pub(crate) rings: Vec<Arc<RingBuffer>>,
    pub(crate) sinks: Vec<SinkRef>,
    /// `rings[0]` is a reader-less buffer created for an unconnected output.
    pub(crate) private: bool,
}

struct RunningThread {
    handle: JoinHandle<Box<dyn Processor>>,
    done: Receiver<()>,
}

pub(crate) struct NodeCore {
    processor: Option<Box<dyn Processor>>,
    properties: Properties,
    pub(crate) config: Option<NodeConfig>,
    pub(crate) inputs: Vec<Option<InputLink>>,
    pub(crate) outputs: Vec<OutputWire>,
    thread: Option<RunningThread>,
    trapdoor: Trapdoor,
    default_words: usize,
    stop_timeout: Duration,
}

impl NodeCore {
    pub(crate) fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    pub(crate) fn spec(&self, name: &str) -> Result<PortSpec, GraphError> {
        match &self.config {
            Some(NodeConfig::Resolved(spec)) => Ok(*spec),
            Some(NodeConfig::Pending { .. }) => Err(GraphError::Unresolved(name.to_string())),
            None => Err(GraphError::NotConfigured(name.to_string())),
        }
    }

    fn rings(&self) -> Vec<Arc<RingBuffer>> {
        let inputs = self.inputs.iter().flatten().map(|l| Arc::clone(&l.ring));
        let outputs = self.outputs.iter().flat_map(|w| w.rings.iter().cloned());
        inputs.chain(outputs).collect()
    }

    fn apply_spec(&mut self, spec: PortSpec) {
        let inputs = spec.inputs.fixed().unwrap_or(0);
        let outputs = spec.outputs.fixed().unwrap_or(0);
        for link in self.inputs.drain(inputs.min(self.inputs.len())..).flatten() {
            link.ring.detach_reader(link.reader);
        }
        self.inputs.resize_with(inputs, || None);
        if self.outputs.len() > outputs {
            tracing::warn!(
                dropped = self.outputs.len() - outputs,
                "reconfiguration removed connected outputs"
            );
        }
        self.outputs.truncate(outputs);
        self.outputs.resize_with(outputs, OutputWire::default);
        for link in self.inputs.iter().flatten() {
            link.ring.request_capacity(spec.min_input_space);
        }
        self.config = Some(NodeConfig::Resolved(spec));
    }
}

#[derive(Default)]
struct StatusCell {
    state: Mutex<NodeState>,
    changed: Condvar,
}

impl StatusCell {
    fn get(&self) -> NodeState {
        self.state.lock().clone()
    }

    fn set(&self, state: NodeState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }

    /// Sets `next` only if the current state is `from`.
    fn advance(&self, from: &NodeState, next: NodeState) {
        let mut st = self.state.lock();
        if *st == *from {
            *st = next;
            self.changed.notify_all();
        }
    }

    fn wait_settled(&self) -> NodeState {
        let mut st = self.state.lock();
        while *st == NodeState::Initializing {
            self.changed.wait(&mut st);
        }
        st.clone()
    }
}

pub(crate) struct NodeShared {
    name: String,
    type_name: String,
    pub(crate) core: Mutex<NodeCore>,
    status: Arc<StatusCell>,
}

impl Drop for NodeShared {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A graph vertex. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeShared>);

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.0.name)
            .field("type", &self.0.type_name)
            .field("state", &self.state())
            .finish()
    }
}

impl Node {
    /// Wraps a processor in a new, unconfigured node.
    pub fn new(name: impl Into<String>, processor: Box<dyn Processor>) -> Self {
        let type_name = processor.type_name().to_string();
        Node(Arc::new(NodeShared {
            name: name.into(),
            type_name,
            core: Mutex::new(NodeCore {
                processor: Some(processor),
                properties: Properties::new(),
                config: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
                thread: None,
                trapdoor: Trapdoor::new(),
                default_words: DEFAULT_BUFFER_WORDS,
                stop_timeout: DEFAULT_STOP_TIMEOUT,
            }),
            status: Arc::new(StatusCell::default()),
        }))
    }

    /// Unique name within its group.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The processor's registry identifier.
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// Returns true if both handles refer to the same node.
    pub fn same(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.0.status.get()
    }

    /// Returns true while the node thread exists.
    pub fn is_running(&self) -> bool {
        self.0.core.lock().is_running()
    }

    /// Current configuration, if configured.
    pub fn config(&self) -> Option<NodeConfig> {
        self.0.core.lock().config.clone()
    }

    /// Properties the processor was last configured with, defaults included.
    pub fn properties(&self) -> Properties {
        self.0.core.lock().properties.clone()
    }

    /// Input port count, once resolved.
    pub fn input_count(&self) -> Option<usize> {
        self.0.core.lock().spec(&self.0.name).ok()?.inputs.fixed()
    }

    /// Output port count, once resolved.
    pub fn output_count(&self) -> Option<usize> {
        self.0.core.lock().spec(&self.0.name).ok()?.outputs.fixed()
    }

    /// Sets the default buffer size for this node's outputs.
    pub fn set_default_words(&self, words: usize) {
        self.0.core.lock().default_words = words.max(1);
    }

    /// Sets how long [`stop`](Self::stop) waits before detaching the thread.
    pub fn set_stop_timeout(&self, timeout: Duration) {
        self.0.core.lock().stop_timeout = timeout;
    }

    /// Configures the processor from `props` (overlaid on its defaults).
    pub fn configure(&self, props: &Properties) -> Result<(), GraphError> {
        let mut core = self.0.core.lock();
        if core.is_running() {
            return Err(GraphError::Running(self.0.name.clone()));
        }
        let processor = core
            .processor
            .as_mut()
            .ok_or_else(|| GraphError::Rejected(format!("node '{}' lost its processor", self.0.name)))?;
        let merged = props.over(&processor.default_properties());
        let spec = processor
            .init_from_properties(&merged)
            .map_err(|kind| GraphError::Rejected(kind.to_string()))?;
        tracing::debug!(node = %self.0.name, ?spec, "configured");
        core.properties = merged.clone();
        if spec.is_resolved() {
            core.apply_spec(spec);
        } else {
            core.config = Some(NodeConfig::Pending {
                properties: merged,
                spec,
            });
        }
        Ok(())
    }

    /// Resolves a deferred port count. A node that is already resolved is
    /// left unchanged.
    pub fn resolve_multiplicity(&self, count: usize) -> Result<(), GraphError> {
        let mut core = self.0.core.lock();
        match &core.config {
            None => return Err(GraphError::NotConfigured(self.0.name.clone())),
            Some(NodeConfig::Resolved(_)) => return Ok(()),
            Some(NodeConfig::Pending { .. }) => {}
        }
        let processor = core
            .processor
            .as_mut()
            .ok_or_else(|| GraphError::Running(self.0.name.clone()))?;
        let spec = processor
            .resolve_multiplicity(count)
            .map_err(|kind| GraphError::Rejected(kind.to_string()))?;
        if !spec.is_resolved() {
            return Err(GraphError::Unresolved(self.0.name.clone()));
        }
        tracing::debug!(node = %self.0.name, count, "multiplicity resolved");
        core.apply_spec(spec);
        Ok(())
    }

    /// Input port `index`.
    pub fn input(&self, index: usize) -> InputPort<'_> {
        InputPort::new(self, index)
    }

    /// Output port `index`.
    pub fn output(&self, index: usize) -> OutputPort<'_> {
        OutputPort::new(self, index)
    }

    /// Connects output `k` of this node to input `k` of `to` for every `k`,
    /// resolving whichever side is still pending from the other's count.
    pub fn connect_all(&self, to: &Node) -> Result<(), GraphError> {
        let outputs = self.output_count();
        let inputs = to.input_count();
        let count = match (outputs, inputs) {
            (Some(o), Some(i)) if o == i => o,
            (Some(o), Some(i)) => {
                return Err(GraphError::ArityMismatch {
                    outputs: o,
                    inputs: i,
                });
            }
            (Some(o), None) => {
                to.resolve_multiplicity(o)?;
                o
            }
            (None, Some(i)) => {
                self.resolve_multiplicity(i)?;
                i
            }
            (None, None) => return Err(GraphError::Unresolved(self.0.name.clone())),
        };
        if to.input_count() != Some(count) || self.output_count() != Some(count) {
            return Err(GraphError::ArityMismatch {
                outputs: self.output_count().unwrap_or(0),
                inputs: to.input_count().unwrap_or(0),
            });
        }
        for k in 0..count {
            self.output(k).connect(&to.input(k))?;
        }
        Ok(())
    }

    /// Spawns the node thread. Returns once spawned; use
    /// [`wait_until_going`](Self::wait_until_going) for the outcome.
    /// Starting a running node does nothing.
    pub fn start(&self) {
        self.0.start();
    }

    /// Blocks until start-up has settled.
    pub fn wait_until_going(&self) -> Result<(), ErrorKind> {
        match self.0.status.wait_settled() {
            NodeState::Running => Ok(()),
            NodeState::Error(kind) => Err(kind),
            _ => Err(ErrorKind::NotStarted),
        }
    }

    /// Stops the node thread. Does nothing if it is not running.
    pub fn stop(&self) {
        self.0.stop();
    }

    /// Clears input buffers and the processor's per-run state.
    pub fn reset(&self) -> Result<(), GraphError> {
        let mut core = self.0.core.lock();
        if core.is_running() {
            return Err(GraphError::Running(self.0.name.clone()));
        }
        for link in core.inputs.iter().flatten() {
            link.ring.clear();
        }
        if let Some(processor) = core.processor.as_mut() {
            processor.reset();
        }
        tracing::debug!(node = %self.0.name, "reset");
        Ok(())
    }

    /// Runs `f` on the processor while the node is stopped.
    pub fn with_processor<R>(&self, f: impl FnOnce(&mut dyn Processor) -> R) -> Option<R> {
        let mut core = self.0.core.lock();
        core.processor.as_mut().map(|p| f(p.as_mut()))
    }
}

impl NodeShared {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) {
        let mut core = self.core.lock();
        if core.is_running() {
            return;
        }
        let spec = match &core.config {
            Some(NodeConfig::Resolved(spec)) => *spec,
            _ => {
                tracing::warn!(node = %self.name, "started before being configured");
                self.status.set(NodeState::Error(ErrorKind::NotInitialized));
                return;
            }
        };
        let Some(processor) = core.processor.take() else {
            self.status.set(NodeState::Error(ErrorKind::Custom(
                "processor lost with a detached thread".into(),
            )));
            return;
        };

        for wire in &mut core.outputs {
            if wire.rings.is_empty() {
                wire.rings.push(Arc::new(RingBuffer::new(1, 1)));
                wire.private = true;
            }
        }

        core.trapdoor = Trapdoor::new();
        let ctx = NodeThread {
            name: self.name.clone(),
            trapdoor: core.trapdoor.clone(),
            status: Arc::clone(&self.status),
            spec,
            default_words: core.default_words,
            inputs: core
                .inputs
                .iter()
                .map(|link| {
                    link.as_ref().map(|l| InputEnd {
                        ring: Arc::clone(&l.ring),
                        reader: l.reader,
                    })
                })
                .collect(),
            outputs: core.outputs.iter().map(|w| w.rings.clone()).collect(),
        };

        self.status.set(NodeState::Initializing);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let spawned = thread::Builder::new()
            .name(format!("sluice:{}", self.name))
            .spawn(move || {
                let _done = done_tx;
                ctx.run(processor)
            });
        match spawned {
            Ok(handle) => {
                tracing::info!(node = %self.name, "started");
                core.thread = Some(RunningThread {
                    handle,
                    done: done_rx,
                });
            }
            Err(err) => {
                tracing::error!(node = %self.name, %err, "failed to spawn node thread");
                self.status
                    .set(NodeState::Error(ErrorKind::Custom(format!("spawn failed: {err}"))));
            }
        }
    }

    pub(crate) fn stop(&self) {
        let (running, rings, trapdoor, timeout) = {
            let mut core = self.core.lock();
            let Some(running) = core.thread.take() else {
                return;
            };
            (running, core.rings(), core.trapdoor.clone(), core.stop_timeout)
        };

        if !matches!(self.status.get(), NodeState::Error(_)) {
            self.status.set(NodeState::Stopping);
        }
        trapdoor.set_open();
        for ring in &rings {
            ring.open_trapdoor(&trapdoor);
        }

        let finished = match running.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };
        let processor = if finished {
            match running.handle.join() {
                Ok(processor) => Some(processor),
                Err(_) => {
                    tracing::error!(node = %self.name, "node thread panicked");
                    None
                }
            }
        } else {
            tracing::error!(
                node = %self.name,
                ?timeout,
                "node thread did not stop in time; detaching it"
            );
            None
        };

        let mut core = self.core.lock();
        let lost = processor.is_none();
        if let Some(mut processor) = processor {
            processor.stopped();
            core.processor = Some(processor);
            for ring in &rings {
                ring.close_trapdoor(&trapdoor);
            }
        }
        for wire in &mut core.outputs {
            if wire.private {
                wire.rings.clear();
                wire.private = false;
            }
            for ring in &wire.rings {
                ring.reset_type();
            }
        }
        drop(core);

        if lost {
            self.status.set(NodeState::Error(ErrorKind::Custom(
                "node thread lost".into(),
            )));
        } else if !matches!(self.status.get(), NodeState::Error(_)) {
            self.status.set(NodeState::Stopped);
        }
        tracing::info!(node = %self.name, "stopped");
    }
}

enum Negotiation {
    Bail,
    Failed(ErrorKind),
}

impl From<Bail> for Negotiation {
    fn from(_: Bail) -> Self {
        Negotiation::Bail
    }
}

impl From<ErrorKind> for Negotiation {
    fn from(kind: ErrorKind) -> Self {
        Negotiation::Failed(kind)
    }
}

/// Everything the node thread owns while running.
struct NodeThread {
    name: String,
    trapdoor: Trapdoor,
    status: Arc<StatusCell>,
    spec: PortSpec,
    default_words: usize,
    inputs: Vec<Option<InputEnd>>,
    outputs: Vec<Vec<Arc<RingBuffer>>>,
}

impl NodeThread {
    fn run(self, mut processor: Box<dyn Processor>) -> Box<dyn Processor> {
        let ends = match self.negotiate(processor.as_mut()) {
            Ok(ends) => ends,
            Err(Negotiation::Bail) => {
                processor.stopping();
                return processor;
            }
            Err(Negotiation::Failed(kind)) => {
                tracing::warn!(node = %self.name, error = %kind, "failed to start");
                for ring in self.outputs.iter().flatten() {
                    ring.publish_type(TypeSlot::Failed, 0, 0);
                }
                self.status.set(NodeState::Error(kind));
                processor.stopping();
                return processor;
            }
        };
        self.status
            .advance(&NodeState::Initializing, NodeState::Running);

        let io = Io::new(&ends, &self.outputs, &self.trapdoor);
        match self.drive(processor.as_mut(), &io, &ends) {
            Ok(Flow::Failed(kind)) => {
                tracing::error!(node = %self.name, error = %kind, "processor failed");
                self.status.set(NodeState::Error(kind));
            }
            Ok(_) => tracing::debug!(node = %self.name, "processor finished"),
            Err(Bail) => tracing::debug!(node = %self.name, "trapdoor opened"),
        }
        processor.stopping();
        processor
    }

    fn negotiate(&self, processor: &mut dyn Processor) -> Result<Vec<InputEnd>, Negotiation> {
        let mut ends = Vec::with_capacity(self.inputs.len());
        let mut types = Vec::with_capacity(self.inputs.len());
        for (i, end) in self.inputs.iter().enumerate() {
            let Some(end) = end else {
                return Err(ErrorKind::InputNotConnected(i).into());
            };
            match end.ring.wait_type(&self.trapdoor)? {
                TypeSlot::Ready(ty) => types.push(ty),
                TypeSlot::Null => return Err(ErrorKind::InputTypeNull(i).into()),
                TypeSlot::Failed => return Err(ErrorKind::RecursiveFailure(i).into()),
                TypeSlot::Pending => return Err(Negotiation::Bail),
            }
            ends.push(end.clone());
        }

        if self.spec.homogeneous_inputs {
            if let Some(first) = types.first() {
                if let Some(i) = types.iter().position(|t| !t.same_shape(first)) {
                    return Err(ErrorKind::InputsNotHomogeneous(i).into());
                }
            }
        }

        let out_types = processor.specify_types(&types)?;
        if out_types.len() < self.outputs.len() {
            return Err(ErrorKind::OutputsNull(out_types.len()).into());
        }
        processor.started()?;

        for (rings, ty) in self.outputs.iter().zip(out_types) {
            for ring in rings {
                ring.publish_type(
                    TypeSlot::Ready(ty),
                    self.spec.min_output_space,
                    self.default_words,
                );
            }
        }
        tracing::debug!(node = %self.name, inputs = ?types, "types settled");
        Ok(ends)
    }

    fn drive(&self, processor: &mut dyn Processor, io: &Io<'_>, ends: &[InputEnd]) -> Result<Flow, Bail> {
        loop {
            if self.trapdoor.is_open() {
                return Err(Bail);
            }
            if !ends.is_empty() && ends.iter().all(InputEnd::at_plunger) {
                for end in ends {
                    end.ring.skip_plungers(end.reader, 1);
                }
                tracing::trace!(node = %self.name, "relaying plunger");
                processor.on_plunger(io)?;
                io.plunge()?;
                io.take_progress();
                continue;
            }

            match processor.process(io)? {
                Flow::Continue => {}
                done => return Ok(done),
            }

            if !io.take_progress() {
                if ends.iter().any(InputEnd::at_plunger) {
                    self.align(ends)?;
                } else {
                    thread::yield_now();
                }
            }
        }
    }

    /// Drains inputs not yet on a plunger up to their next one.
    fn align(&self, ends: &[InputEnd]) -> Result<(), Bail> {
        for (i, end) in ends.iter().enumerate() {
            let mut dropped = 0;
            while !end.at_plunger() {
                let n = end.ring.wait_ready(end.reader, end.ring.capacity(), &self.trapdoor)?;
                end.ring.skip(end.reader, n);
                dropped += n;
            }
            if dropped > 0 {
                tracing::debug!(node = %self.name, input = i, dropped, "aligned segment");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalType;

    /// Emits `total` samples counting from zero, then a plunger.
    struct Counter {
        total: usize,
        sent: usize,
    }

    impl Processor for Counter {
        fn type_name(&self) -> &str {
            "counter"
        }

        fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind> {
            self.total = props.get_usize("total").unwrap_or(8);
            Ok(PortSpec::new(0, 1))
        }

        fn specify_types(&mut self, _: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
            Ok(vec![SignalType::Wave { rate: 8.0 }])
        }

        fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
            if self.sent == self.total {
                io.plunge()?;
                return Ok(Flow::Finished);
            }
            let mut view = io.write_scratch(0, 1)?;
            view.data_mut()[0] = self.sent as f32;
            io.commit(0, view)?;
            self.sent += 1;
            Ok(Flow::Continue)
        }

        fn reset(&mut self) {
            self.sent = 0;
        }
    }

    /// Records every sample and plunger it sees.
    #[derive(Default)]
    struct Tap {
        seen: Arc<Mutex<(Vec<f32>, usize)>>,
    }

    impl Processor for Tap {
        fn type_name(&self) -> &str {
            "tap"
        }

        fn init_from_properties(&mut self, _: &Properties) -> Result<PortSpec, ErrorKind> {
            Ok(PortSpec::new(1, 0))
        }

        fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
            match inputs[0] {
                SignalType::Wave { .. } => Ok(Vec::new()),
                ref other => Err(ErrorKind::InvalidInputs(format!("expected a wave, got {other}"))),
            }
        }

        fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
            let n = io.wait(0, 4)?;
            if n > 0 {
                let data = io.read(0, n);
                self.seen.lock().0.extend_from_slice(data.words());
            }
            Ok(Flow::Continue)
        }

        fn on_plunger(&mut self, _: &Io<'_>) -> Result<(), Bail> {
            self.seen.lock().1 += 1;
            Ok(())
        }
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn source_to_sink_with_plunger() {
        let source = Node::new("source", Box::new(Counter { total: 0, sent: 0 }));
        source.configure(&Properties::new().with("total", 10usize)).unwrap();
        let tap = Tap::default();
        let seen = Arc::clone(&tap.seen);
        let sink = Node::new("sink", Box::new(tap));
        sink.configure(&Properties::new()).unwrap();
        source.output(0).connect(&sink.input(0)).unwrap();

        sink.start();
        source.start();
        assert_eq!(source.wait_until_going(), Ok(()));
        assert_eq!(sink.wait_until_going(), Ok(()));
        wait_for(|| seen.lock().1 == 1);

        let (samples, plungers) = seen.lock().clone();
        assert_eq!(samples, (0..10).map(|v| v as f32).collect::<Vec<_>>());
        assert_eq!(plungers, 1);

        sink.stop();
        source.stop();
        assert_eq!(sink.state(), NodeState::Stopped);
        // Stopping again is a no-op.
        sink.stop();
        assert_eq!(sink.state(), NodeState::Stopped);
    }

    #[test]
    fn unconfigured_node_fails_with_not_initialized() {
        let node = Node::new("bare", Box::new(Tap::default()));
        node.start();
        assert_eq!(node.wait_until_going(), Err(ErrorKind::NotInitialized));
        node.stop();
    }

    #[test]
    fn unconnected_input_is_reported() {
        let sink = Node::new("sink", Box::new(Tap::default()));
        sink.configure(&Properties::new()).unwrap();
        sink.start();
        assert_eq!(sink.wait_until_going(), Err(ErrorKind::InputNotConnected(0)));
        sink.stop();
        assert_eq!(sink.state(), NodeState::Error(ErrorKind::InputNotConnected(0)));
    }

    #[test]
    fn stop_releases_a_thread_waiting_for_types() {
        let source = Node::new("source", Box::new(Counter { total: 0, sent: 0 }));
        source.configure(&Properties::new()).unwrap();
        let sink = Node::new("sink", Box::new(Tap::default()));
        sink.configure(&Properties::new()).unwrap();
        source.output(0).connect(&sink.input(0)).unwrap();

        sink.start();
        assert_eq!(sink.state(), NodeState::Initializing);
        sink.stop();
        assert_eq!(sink.state(), NodeState::Stopped);
    }

    #[test]
    fn restart_after_reset_replays() {
        let source = Node::new("source", Box::new(Counter { total: 0, sent: 0 }));
        source.configure(&Properties::new().with("total", 3usize)).unwrap();
        let tap = Tap::default();
        let seen = Arc::clone(&tap.seen);
        let sink = Node::new("sink", Box::new(tap));
        sink.configure(&Properties::new()).unwrap();
        source.output(0).connect(&sink.input(0)).unwrap();

        for round in 1..=2 {
            sink.start();
            source.start();
            wait_for(|| seen.lock().1 == round);
            source.stop();
            sink.stop();
            source.reset().unwrap();
            sink.reset().unwrap();
        }
        assert_eq!(seen.lock().0, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
    }
}
