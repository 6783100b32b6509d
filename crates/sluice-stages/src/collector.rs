//! Collector - a sink that records everything it receives.
//!
//! The number of inputs may be left open at configuration (`inputs = 0`)
//! and fixed later by the graph, either explicitly through
//! [`Node::resolve_multiplicity`](sluice_core::Node::resolve_multiplicity)
//! or by [`Node::connect_all`](sluice_core::Node::connect_all) from a peer
//! whose output count is known.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sluice_core::{Arity, Bail, ErrorKind, Flow, Io, PortSpec, Processor, Properties, SignalType};

#[derive(Debug, Default)]
struct Recorded {
    types: Vec<SignalType>,
    words: Vec<Vec<f32>>,
    /// Word offset of every plunger, per input.
    boundaries: Vec<Vec<usize>>,
    plungers: usize,
}

/// Read side of a [`Collector`], usable while the node runs.
#[derive(Debug, Clone, Default)]
pub struct CollectorHandle {
    inner: Arc<(Mutex<Recorded>, Condvar)>,
}

impl CollectorHandle {
    /// Every word received on `input`.
    pub fn words(&self, input: usize) -> Vec<f32> {
        self.inner.0.lock().words.get(input).cloned().unwrap_or_default()
    }

    /// Words received on `input`, split at each plunger. A trailing,
    /// unterminated segment is included when non-empty.
    pub fn segments(&self, input: usize) -> Vec<Vec<f32>> {
        let rec = self.inner.0.lock();
        let Some(words) = rec.words.get(input) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut from = 0;
        for &at in rec.boundaries.get(input).into_iter().flatten() {
            out.push(words[from..at].to_vec());
            from = at;
        }
        if from < words.len() {
            out.push(words[from..].to_vec());
        }
        out
    }

    /// Negotiated input types of the last run.
    pub fn types(&self) -> Vec<SignalType> {
        self.inner.0.lock().types.clone()
    }

    /// Plungers relayed so far.
    pub fn plungers(&self) -> usize {
        self.inner.0.lock().plungers
    }

    /// Blocks until at least `count` plungers have arrived or `timeout`
    /// passes. Returns true on success.
    pub fn wait_for_plungers(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut rec = lock.lock();
        while rec.plungers < count {
            if cvar.wait_until(&mut rec, deadline).timed_out() {
                return rec.plungers >= count;
            }
        }
        true
    }

    /// Forgets everything recorded.
    pub fn clear(&self) {
        let mut rec = self.inner.0.lock();
        for words in &mut rec.words {
            words.clear();
        }
        for b in &mut rec.boundaries {
            b.clear();
        }
        rec.plungers = 0;
    }
}

/// Records samples and segment boundaries from any number of homogeneous
/// inputs.
///
/// ## Parameters
/// - `inputs`: Input count, 0 to defer (default 1)
/// - `chunk`: Largest read per call (default 256)
#[derive(Debug, Clone)]
pub struct Collector {
    handle: CollectorHandle,
    chunk: usize,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            handle: CollectorHandle::default(),
            chunk: 256,
        }
    }
}

impl Collector {
    /// Creates a collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for reading what was collected.
    pub fn handle(&self) -> CollectorHandle {
        self.handle.clone()
    }

    fn spec(&self, inputs: usize) -> PortSpec {
        PortSpec::new(inputs, 0).with_input_space(self.chunk).homogeneous()
    }
}

impl Processor for Collector {
    fn type_name(&self) -> &str {
        "collector"
    }

    fn default_properties(&self) -> Properties {
        Properties::new().with("inputs", 1usize).with("chunk", 256usize)
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind> {
        self.chunk = props.get_usize("chunk").unwrap_or(256).max(1);
        match props.get_usize("inputs").unwrap_or(1) {
            0 => Ok(PortSpec {
                inputs: Arity::Deferred,
                ..self.spec(0)
            }),
            n => Ok(self.spec(n)),
        }
    }

    fn resolve_multiplicity(&mut self, count: usize) -> Result<PortSpec, ErrorKind> {
        Ok(self.spec(count))
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
        let mut rec = self.handle.inner.0.lock();
        rec.types = inputs.to_vec();
        rec.words.resize_with(inputs.len(), Vec::new);
        rec.boundaries.resize_with(inputs.len(), Vec::new);
        Ok(Vec::new())
    }

    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        for i in 0..io.inputs() {
            if io.next_plunger(i) == Some(0) {
                continue;
            }
            let n = io.wait(i, self.chunk)?;
            if n > 0 {
                let data = io.read(i, n);
                self.handle.inner.0.lock().words[i].extend_from_slice(data.words());
            }
        }
        Ok(Flow::Continue)
    }

    fn on_plunger(&mut self, _io: &Io<'_>) -> Result<(), Bail> {
        let (lock, cvar) = &*self.handle.inner;
        let mut rec = lock.lock();
        let Recorded {
            words,
            boundaries,
            plungers,
            ..
        } = &mut *rec;
        for (b, w) in boundaries.iter_mut().zip(words.iter()) {
            b.push(w.len());
        }
        *plungers += 1;
        cvar.notify_all();
        Ok(())
    }
}
