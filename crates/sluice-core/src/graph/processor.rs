//! The compute routine a node thread drives.

use crate::error::{Bail, ErrorKind};
use crate::properties::Properties;
use crate::signal::SignalType;

use super::io::Io;

/// A port count, possibly left for a connected peer to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Known port count.
    Fixed(usize),
    /// Matches the peer's count once resolved.
    Deferred,
}

impl Arity {
    /// The count, if known.
    pub fn fixed(self) -> Option<usize> {
        match self {
            Arity::Fixed(n) => Some(n),
            Arity::Deferred => None,
        }
    }
}

/// What a processor needs from its node: ports and buffer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    /// Input port count.
    pub inputs: Arity,
    /// Output port count.
    pub outputs: Arity,
    /// Minimum samples each input buffer must hold.
    pub min_input_space: usize,
    /// Minimum samples each output buffer must hold.
    pub min_output_space: usize,
    /// Require every input to carry the same signal shape.
    pub homogeneous_inputs: bool,
}

impl PortSpec {
    /// Fixed port counts with single-sample space requirements.
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs: Arity::Fixed(inputs),
            outputs: Arity::Fixed(outputs),
            min_input_space: 1,
            min_output_space: 1,
            homogeneous_inputs: false,
        }
    }

    /// Sets the minimum input buffer space.
    pub fn with_input_space(mut self, samples: usize) -> Self {
        self.min_input_space = samples;
        self
    }

    /// Sets the minimum output buffer space.
    pub fn with_output_space(mut self, samples: usize) -> Self {
        self.min_output_space = samples;
        self
    }

    /// Requires homogeneous inputs.
    pub fn homogeneous(mut self) -> Self {
        self.homogeneous_inputs = true;
        self
    }

    /// Returns true if both port counts are known.
    pub fn is_resolved(&self) -> bool {
        self.inputs.fixed().is_some() && self.outputs.fixed().is_some()
    }
}

/// Result of one [`Processor::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Call again.
    Continue,
    /// Nothing more will be produced; the thread exits normally.
    Finished,
    /// A fault the node cannot recover from; the node enters the error state.
    Failed(ErrorKind),
}

/// A node's compute routine.
///
/// The node calls [`init_from_properties`](Self::init_from_properties) when
/// configured, then on each start runs, on its own thread:
/// [`specify_types`](Self::specify_types), [`started`](Self::started), and
/// [`process`](Self::process) repeatedly until stopped.
/// [`on_plunger`](Self::on_plunger) fires once every input has reached a
/// plunger, just before the plunger is relayed downstream.
///
/// Blocking [`Io`] calls return [`Bail`] once the node is being stopped;
/// propagate it with `?`.
pub trait Processor: Send {
    /// Registry identifier of this processor.
    fn type_name(&self) -> &str;

    /// Defaults for every property the processor understands.
    fn default_properties(&self) -> Properties {
        Properties::new()
    }

    /// Applies configuration and declares ports and buffer needs.
    fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind>;

    /// Fixes a deferred port count once a peer's arity is known.
    fn resolve_multiplicity(&mut self, count: usize) -> Result<PortSpec, ErrorKind> {
        let _ = count;
        Err(ErrorKind::Custom(format!(
            "{} has a fixed multiplicity",
            self.type_name()
        )))
    }

    /// Validates input types and returns one type per output.
    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind>;

    /// Called on the node thread once types are settled, before the first
    /// [`process`](Self::process).
    fn started(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }

    /// Does one unit of work.
    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail>;

    /// Called when every input has reached a plunger.
    fn on_plunger(&mut self, io: &Io<'_>) -> Result<(), Bail> {
        let _ = io;
        Ok(())
    }

    /// Called on the node thread as it winds down.
    fn stopping(&mut self) {}

    /// Called after the node thread has been joined.
    fn stopped(&mut self) {}

    /// Clears any per-run state.
    fn reset(&mut self) {}
}
