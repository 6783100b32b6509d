//! How a worker pool talks to one worker.

use std::time::Duration;

use thiserror::Error;

use crate::properties::Properties;
use crate::signal::SignalType;
use crate::view::BufferData;

/// Failures reported by a coupling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouplingError {
    /// The worker is gone for good (connection dropped, timed out).
    #[error("worker lost: {0}")]
    Lost(String),
    /// The worker answered but refused the request.
    #[error("worker refused: {0}")]
    Refused(String),
}

/// One worker of a [`WorkerPool`](super::WorkerPool), local or remote.
///
/// Call order: [`init_from_properties`](Self::init_from_properties),
/// [`define_io`](Self::define_io), [`specify_types`](Self::specify_types),
/// [`go`](Self::go); then any number of
/// [`transact`](Self::transact)/[`deliver_results`](Self::deliver_results)
/// pairs; then [`stopping`](Self::stopping), [`stop`](Self::stop),
/// [`stopped`](Self::stopped). Results are delivered in the order the
/// transactions were issued.
pub trait Coupling: Send {
    /// Human-readable label for logs and statistics.
    fn describe(&self) -> String;

    /// Configures the worker's stage.
    fn init_from_properties(&mut self, props: &Properties) -> Result<(), CouplingError>;

    /// Declares the channel counts the pool will send and expect back.
    fn define_io(&mut self, inputs: usize, outputs: usize) -> Result<(), CouplingError>;

    /// Checks that the worker's stage maps `inputs` to exactly `outputs`.
    fn specify_types(&mut self, inputs: &[SignalType], outputs: &[SignalType]) -> Result<bool, CouplingError>;

    /// Prepares the worker to receive chunks.
    fn go(&mut self) -> Result<(), CouplingError>;

    /// Tells the worker no more chunks are coming.
    fn stop(&mut self) -> Result<(), CouplingError>;

    /// Called before [`stop`](Self::stop).
    fn stopping(&mut self) -> Result<(), CouplingError> {
        Ok(())
    }

    /// Called after [`stop`](Self::stop).
    fn stopped(&mut self) -> Result<(), CouplingError> {
        Ok(())
    }

    /// Submits `count` chunks; one block per input channel.
    fn transact(&mut self, inputs: &[BufferData], count: usize) -> Result<(), CouplingError>;

    /// Collects the results of the oldest outstanding transaction, with the
    /// time the worker spent on it.
    fn deliver_results(&mut self) -> Result<(Vec<BufferData>, Duration), CouplingError>;

    /// One round trip: transact, then deliver.
    fn process_chunks(&mut self, inputs: &[BufferData], count: usize) -> Result<Vec<BufferData>, CouplingError> {
        self.transact(inputs, count)?;
        Ok(self.deliver_results()?.0)
    }

    /// Transactions that may be outstanding at once.
    fn pipeline_depth(&self) -> usize {
        1
    }
}
