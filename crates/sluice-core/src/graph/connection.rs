//! Ports and the wires between them.
//!
//! An output reaches its consumers in one of three ways:
//!
//! - **connect**: a fresh buffer for one consumer. Connecting an output that
//!   already drives a wire adds an independent copy, as `split` does.
//! - **split**: a fresh buffer per consumer; the producer writes each copy.
//! - **share**: one buffer, one reader cursor per consumer. The slowest
//!   consumer sets the pace.
//!
//! Wiring may only change while both nodes are stopped.

use std::sync::Arc;

use parking_lot::MutexGuard;

use crate::error::GraphError;
use crate::ring::RingBuffer;

use super::node::{InputLink, Node, NodeCore, NodeShared, SinkRef};

/// How an input is attached to its producer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMode {
    /// The output's first wire.
    Direct,
    /// An independent copy of the output.
    Split,
    /// A reader on a buffer shared with other consumers.
    Shared,
}

/// Description of one wire, as seen from its consumer.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Producer node name, if the producer still exists.
    pub source: Option<String>,
    /// Producer output index.
    pub source_port: usize,
    /// Consumer node name.
    pub sink: String,
    /// Consumer input index.
    pub sink_port: usize,
    /// How the consumer is attached.
    pub mode: LinkMode,
    ring: Arc<RingBuffer>,
}

impl Connection {
    /// The buffer carrying this wire.
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}

/// An output port handle.
#[derive(Debug, Clone, Copy)]
pub struct OutputPort<'a> {
    node: &'a Node,
    index: usize,
}

/// An input port handle.
#[derive(Debug, Clone, Copy)]
pub struct InputPort<'a> {
    node: &'a Node,
    index: usize,
}

impl<'a> OutputPort<'a> {
    pub(crate) fn new(node: &'a Node, index: usize) -> Self {
        Self { node, index }
    }

    /// Port index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Wires this output to `input` through a new buffer.
    pub fn connect(&self, input: &InputPort<'_>) -> Result<(), GraphError> {
        link(self, input, LinkMode::Direct)
    }

    /// Wires an independent copy of this output to `input`.
    pub fn split(&self, input: &InputPort<'_>) -> Result<(), GraphError> {
        link(self, input, LinkMode::Split)
    }

    /// Lets `input` read this output's existing buffer with its own cursor.
    pub fn share(&self, input: &InputPort<'_>) -> Result<(), GraphError> {
        link(self, input, LinkMode::Shared)
    }

    /// Number of consumers attached to this output.
    pub fn consumers(&self) -> usize {
        let core = self.node.0.core.lock();
        core.outputs.get(self.index).map_or(0, |w| w.sinks.len())
    }

    /// Disconnects every consumer of this output.
    pub fn disconnect(&self) -> Result<(), GraphError> {
        let sinks: Vec<_> = {
            let core = self.node.0.core.lock();
            if core.is_running() {
                return Err(GraphError::Running(self.node.name().to_string()));
            }
            let wire = core.outputs.get(self.index).ok_or_else(|| no_port(self.node, "output", self.index))?;
            wire.sinks
                .iter()
                .filter_map(|s| s.node.upgrade().map(|n| (n, s.port)))
                .collect()
        };
        for (shared, port) in sinks {
            let sink = Node(shared);
            sink.input(port).disconnect()?;
        }
        Ok(())
    }
}

impl<'a> InputPort<'a> {
    pub(crate) fn new(node: &'a Node, index: usize) -> Self {
        Self { node, index }
    }

    /// Port index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true if a producer is attached.
    pub fn is_connected(&self) -> bool {
        let core = self.node.0.core.lock();
        matches!(core.inputs.get(self.index), Some(Some(_)))
    }

    /// Describes the attached wire.
    pub fn connection(&self) -> Option<Connection> {
        let core = self.node.0.core.lock();
        let link = core.inputs.get(self.index)?.as_ref()?;
        Some(Connection {
            source: link.source.upgrade().map(|n| n.name().to_string()),
            source_port: link.source_port,
            sink: self.node.name().to_string(),
            sink_port: self.index,
            mode: link.mode,
            ring: Arc::clone(&link.ring),
        })
    }

    /// Detaches this input from its producer.
    pub fn disconnect(&self) -> Result<(), GraphError> {
        let source = {
            let core = self.node.0.core.lock();
            let link = core
                .inputs
                .get(self.index)
                .ok_or_else(|| no_port(self.node, "input", self.index))?
                .as_ref()
                .ok_or_else(|| GraphError::NotConnected {
                    node: self.node.name().to_string(),
                    port: self.index,
                })?;
            link.source.upgrade()
        };

        let link = match &source {
            Some(source) if !Arc::ptr_eq(source, &self.node.0) => {
                let (mut src, mut dst) = lock_pair(source, &self.node.0);
                ensure_stopped(&src, source.name())?;
                ensure_stopped(&dst, self.node.name())?;
                let Some(link) = dst.inputs[self.index].take() else {
                    return Ok(());
                };
                if let Some(wire) = src.outputs.get_mut(link.source_port) {
                    let sink = &self.node.0;
                    wire.sinks.retain(|s| {
                        !(s.port == self.index && s.node.upgrade().is_some_and(|n| Arc::ptr_eq(&n, sink)))
                    });
                    link.ring.detach_reader(link.reader);
                    if link.ring.reader_count() == 0 {
                        wire.rings.retain(|r| !Arc::ptr_eq(r, &link.ring));
                    }
                }
                link
            }
            _ => {
                let mut dst = self.node.0.core.lock();
                ensure_stopped(&dst, self.node.name())?;
                let Some(link) = dst.inputs[self.index].take() else {
                    return Ok(());
                };
                link.ring.detach_reader(link.reader);
                link
            }
        };
        tracing::debug!(
            node = %self.node.name(),
            input = self.index,
            source_port = link.source_port,
            "disconnected"
        );
        Ok(())
    }
}

fn no_port(node: &Node, direction: &'static str, port: usize) -> GraphError {
    GraphError::NoSuchPort {
        node: node.name().to_string(),
        direction,
        port,
    }
}

fn ensure_stopped(core: &NodeCore, name: &str) -> Result<(), GraphError> {
    if core.is_running() {
        Err(GraphError::Running(name.to_string()))
    } else {
        Ok(())
    }
}

/// Locks two distinct nodes in address order; returns `(a, b)` guards.
fn lock_pair<'n>(
    a: &'n Arc<NodeShared>,
    b: &'n Arc<NodeShared>,
) -> (MutexGuard<'n, NodeCore>, MutexGuard<'n, NodeCore>) {
    if Arc::as_ptr(a) < Arc::as_ptr(b) {
        let ga = a.core.lock();
        let gb = b.core.lock();
        (ga, gb)
    } else {
        let gb = b.core.lock();
        let ga = a.core.lock();
        (ga, gb)
    }
}

fn link(output: &OutputPort<'_>, input: &InputPort<'_>, requested: LinkMode) -> Result<(), GraphError> {
    let source = &output.node.0;
    let sink = &input.node.0;
    if Arc::ptr_eq(source, sink) {
        return Err(GraphError::Rejected(format!(
            "node '{}' cannot feed itself",
            source.name()
        )));
    }
    let (mut src, mut dst) = lock_pair(source, sink);
    ensure_stopped(&src, source.name())?;
    ensure_stopped(&dst, sink.name())?;
    src.spec(source.name())?;
    let dst_spec = dst.spec(sink.name())?;

    if output.index >= src.outputs.len() {
        return Err(no_port(output.node, "output", output.index));
    }
    match dst.inputs.get(input.index) {
        None => return Err(no_port(input.node, "input", input.index)),
        Some(Some(_)) => {
            return Err(GraphError::AlreadyConnected {
                node: sink.name().to_string(),
                port: input.index,
            });
        }
        Some(None) => {}
    }

    let wire = &mut src.outputs[output.index];
    let (ring, mode) = match requested {
        LinkMode::Shared => match wire.rings.as_slice() {
            [] => {
                let ring = Arc::new(RingBuffer::new(1, 1));
                wire.rings.push(Arc::clone(&ring));
                (ring, LinkMode::Direct)
            }
            [ring] => (Arc::clone(ring), LinkMode::Shared),
            _ => {
                return Err(GraphError::CannotShare {
                    node: source.name().to_string(),
                    port: output.index,
                    reason: "output is split into independent copies",
                });
            }
        },
        LinkMode::Direct | LinkMode::Split => {
            let mode = if wire.rings.is_empty() {
                requested
            } else {
                LinkMode::Split
            };
            let ring = Arc::new(RingBuffer::new(1, 1));
            wire.rings.push(Arc::clone(&ring));
            (ring, mode)
        }
    };

    ring.request_capacity(dst_spec.min_input_space);
    let reader = ring.attach_reader();
    wire.sinks.push(SinkRef {
        node: Arc::downgrade(sink),
        port: input.index,
    });
    dst.inputs[input.index] = Some(InputLink {
        ring,
        reader,
        source: Arc::downgrade(source),
        source_port: output.index,
        mode,
    });
    tracing::debug!(
        from = %source.name(),
        output = output.index,
        to = %sink.name(),
        input = input.index,
        ?mode,
        "connected"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Bail, ErrorKind};
    use crate::graph::{Flow, Io, PortSpec, Processor};
    use crate::properties::Properties;
    use crate::signal::SignalType;

    struct Ports(usize, usize);

    impl Processor for Ports {
        fn type_name(&self) -> &str {
            "ports"
        }

        fn init_from_properties(&mut self, _: &Properties) -> Result<PortSpec, ErrorKind> {
            Ok(PortSpec::new(self.0, self.1).with_input_space(300))
        }

        fn specify_types(&mut self, _: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
            Ok(vec![SignalType::Value { rate: 1.0 }; self.1])
        }

        fn process(&mut self, _: &Io<'_>) -> Result<Flow, Bail> {
            Ok(Flow::Finished)
        }
    }

    fn node(name: &str, inputs: usize, outputs: usize) -> Node {
        let n = Node::new(name, Box::new(Ports(inputs, outputs)));
        n.configure(&Properties::new()).unwrap();
        n
    }

    #[test]
    fn connect_split_and_share() {
        let a = node("a", 0, 1);
        let b = node("b", 1, 0);
        let c = node("c", 1, 0);
        let d = node("d", 1, 0);

        a.output(0).connect(&b.input(0)).unwrap();
        a.output(0).split(&c.input(0)).unwrap();
        assert_eq!(a.output(0).consumers(), 2);
        assert_eq!(c.input(0).connection().unwrap().mode, LinkMode::Split);

        let err = a.output(0).share(&d.input(0)).unwrap_err();
        assert!(matches!(err, GraphError::CannotShare { .. }));

        c.input(0).disconnect().unwrap();
        a.output(0).share(&d.input(0)).unwrap();
        let shared = d.input(0).connection().unwrap();
        assert_eq!(shared.mode, LinkMode::Shared);
        assert!(Arc::ptr_eq(shared.ring(), b.input(0).connection().unwrap().ring()));
        assert_eq!(shared.ring().reader_count(), 2);
    }

    #[test]
    fn wiring_errors() {
        let a = node("a", 0, 1);
        let b = node("b", 1, 0);
        let c = node("c", 1, 0);

        assert!(matches!(
            a.output(1).connect(&b.input(0)),
            Err(GraphError::NoSuchPort { direction: "output", .. })
        ));
        a.output(0).connect(&b.input(0)).unwrap();
        assert!(matches!(
            c.output(0).connect(&b.input(0)),
            Err(GraphError::NoSuchPort { .. })
        ));
        let e = node("e", 0, 1);
        assert!(matches!(
            e.output(0).connect(&b.input(0)),
            Err(GraphError::AlreadyConnected { port: 0, .. })
        ));
        assert!(matches!(
            c.input(0).disconnect(),
            Err(GraphError::NotConnected { .. })
        ));

        let bare = Node::new("bare", Box::new(Ports(1, 1)));
        assert!(matches!(
            a.output(0).connect(&bare.input(0)),
            Err(GraphError::NotConfigured(_))
        ));
    }

    #[test]
    fn consumer_space_request_reaches_the_ring() {
        let a = node("a", 0, 1);
        let b = node("b", 1, 0);
        a.output(0).connect(&b.input(0)).unwrap();
        let ring = Arc::clone(b.input(0).connection().unwrap().ring());
        ring.publish_type(crate::ring::TypeSlot::Ready(SignalType::Value { rate: 1.0 }), 1, 1);
        assert_eq!(ring.capacity(), 512);
    }

    #[test]
    fn output_disconnect_releases_every_consumer() {
        let a = node("a", 0, 1);
        let b = node("b", 1, 0);
        let c = node("c", 1, 0);
        a.output(0).connect(&b.input(0)).unwrap();
        a.output(0).share(&c.input(0)).unwrap();
        a.output(0).disconnect().unwrap();
        assert!(!b.input(0).is_connected());
        assert!(!c.input(0).is_connected());
        assert_eq!(a.output(0).consumers(), 0);
    }
}
