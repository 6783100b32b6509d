//! Sluice Stages - concrete stages and processors
//!
//! Stateless stages (schedulable on a [`WorkerPool`](sluice_core::WorkerPool)):
//!
//! - [`Framer`] - Overlapping, optionally tapered frames (`window`)
//! - [`Sum`] - Per-sample sum of words
//! - [`Gain`] - Fixed gain in dB
//! - [`Magnitude`] - Short-time FFT magnitude spectrum
//!
//! Processors (run directly on a node thread):
//!
//! - [`Ramp`] - Counting source with optional segmenting
//! - [`Sine`] - Test tone source
//! - [`Collector`] - Recording sink with deferred input count
//! - [`Discard`] - Draining sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_core::{Node, PoolOptions, Properties, WorkerPool};
//! use sluice_stages::{Collector, Framer, Ramp};
//!
//! let framer = WorkerPool::new(Arc::new(|| Box::new(Framer::default()) as _), PoolOptions::default());
//! let window = Node::new("window", Box::new(framer));
//! window.configure(&Properties::new().with("size", 8usize).with("hop", 4usize))?;
//! ```

pub mod collector;
pub mod discard;
pub mod framing;
pub mod gain;
pub mod magnitude;
pub mod ramp;
pub mod sine;
pub mod sum;
pub mod taper;

pub use collector::{Collector, CollectorHandle};
pub use discard::Discard;
pub use framing::Framer;
pub use gain::{Gain, db_to_linear};
pub use magnitude::Magnitude;
pub use ramp::Ramp;
pub use sine::Sine;
pub use sum::Sum;
pub use taper::Taper;

use sluice_core::{Properties, SignalType, StageError};

/// Reads a strictly positive integer property.
pub(crate) fn positive(props: &Properties, key: &str, default: usize) -> Result<usize, StageError> {
    match props.get(key) {
        None => Ok(default),
        Some(value) => match value.as_usize() {
            Some(n) if n > 0 => Ok(n),
            _ => Err(StageError::invalid(key, format!("expected a positive integer, got {value:?}"))),
        },
    }
}

/// Rate of the single one-word-per-sample input a framing stage accepts.
pub(crate) fn single_channel_rate(stage: &str, inputs: &[SignalType]) -> Result<f32, StageError> {
    match inputs {
        [ty @ (SignalType::Wave { .. } | SignalType::Value { .. })] => Ok(ty.rate()),
        [other] => Err(StageError::Rejected(format!("{stage} needs a waveform, got {other}"))),
        _ => Err(StageError::Rejected(format!(
            "{stage} takes one input, got {}",
            inputs.len()
        ))),
    }
}

/// Frames per second for a hop of `hop` samples.
pub(crate) fn frame_rate(rate: f32, hop: usize) -> f32 {
    rate / hop as f32
}
