//! Discard - a sink that consumes and drops its input.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sluice_core::{Bail, ErrorKind, Flow, Io, PortSpec, Processor, Properties, SignalType};

/// Drains one input as fast as it arrives, counting samples and segments.
#[derive(Debug, Clone, Default)]
pub struct Discard {
    samples: Arc<AtomicU64>,
    segments: Arc<AtomicU64>,
}

impl Discard {
    /// Creates the sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of samples dropped.
    pub fn samples(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.samples)
    }

    /// Shared counter of plungers seen.
    pub fn segments(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.segments)
    }
}

impl Processor for Discard {
    fn type_name(&self) -> &str {
        "discard"
    }

    fn init_from_properties(&mut self, _props: &Properties) -> Result<PortSpec, ErrorKind> {
        Ok(PortSpec::new(1, 0))
    }

    fn specify_types(&mut self, _inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
        Ok(Vec::new())
    }

    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        let n = io.wait(0, 1)?;
        if n > 0 {
            let avail = io.next_plunger(0).unwrap_or(usize::MAX).min(io.available(0));
            io.skip(0, avail);
            self.samples.fetch_add(avail as u64, Ordering::Relaxed);
        }
        Ok(Flow::Continue)
    }

    fn on_plunger(&mut self, _io: &Io<'_>) -> Result<(), Bail> {
        self.segments.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
