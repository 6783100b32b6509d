//! Error types for graph construction, start-up, and stage configuration.

use thiserror::Error;

/// Returned by every blocking buffer call when the caller's trapdoor opens.
///
/// This is the cooperative-shutdown unwind, not a failure: processors
/// propagate it with `?` and the node thread exits cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("trapdoor opened")]
pub struct Bail;

/// Why a node failed to reach (or is not yet in) the running state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// The node was started before being configured, or its multiplicity is
    /// still unresolved.
    #[error("not initialized")]
    NotInitialized,
    /// An upstream peer produced no type for this input.
    #[error("input {0} has no type")]
    InputTypeNull(usize),
    /// An input port has no connection.
    #[error("input {0} is not connected")]
    InputNotConnected(usize),
    /// Fan-in inputs disagree on their signal type.
    #[error("inputs are not homogeneous (input {0} differs)")]
    InputsNotHomogeneous(usize),
    /// The processor produced fewer output types than it has outputs.
    #[error("output {0} has no type")]
    OutputsNull(usize),
    /// Type negotiation rejected the inputs.
    #[error("invalid inputs: {0}")]
    InvalidInputs(String),
    /// An upstream dependency failed to start.
    #[error("upstream failure on input {0}")]
    RecursiveFailure(usize),
    /// A user hook failed.
    #[error("{0}")]
    Custom(String),
    /// The node has not been started.
    #[error("not started")]
    NotStarted,
    /// Start-up has not finished yet.
    #[error("pending")]
    Pending,
}

impl ErrorKind {
    /// Optional numeric context (usually a port index) for reports.
    pub fn port(&self) -> Option<usize> {
        match self {
            ErrorKind::InputTypeNull(i)
            | ErrorKind::InputNotConnected(i)
            | ErrorKind::InputsNotHomogeneous(i)
            | ErrorKind::OutputsNull(i)
            | ErrorKind::RecursiveFailure(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true for the transient, not-yet-decided kinds.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::NotStarted | ErrorKind::Pending)
    }
}

/// Failures while building or mutating a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Port index out of range.
    #[error("node '{node}' has no {direction} port {port}")]
    NoSuchPort {
        /// Node name.
        node: String,
        /// "input" or "output".
        direction: &'static str,
        /// Requested index.
        port: usize,
    },
    /// The input already has a connection.
    #[error("input {port} of node '{node}' is already connected")]
    AlreadyConnected {
        /// Node name.
        node: String,
        /// Input index.
        port: usize,
    },
    /// No connection exists on the given port.
    #[error("port {port} of node '{node}' is not connected")]
    NotConnected {
        /// Node name.
        node: String,
        /// Port index.
        port: usize,
    },
    /// Wiring may only change while every affected node is stopped.
    #[error("node '{0}' is running")]
    Running(String),
    /// The node has not been configured yet.
    #[error("node '{0}' is not configured")]
    NotConfigured(String),
    /// The node's multiplicity has not been resolved yet.
    #[error("node '{0}' has unresolved multiplicity")]
    Unresolved(String),
    /// Two nodes in one group share a name.
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),
    /// Workers cannot be added once the pool has started.
    #[error("worker set is fixed after the first start")]
    MultiplicityFixed,
    /// A share was requested on an output that is not a single wire.
    #[error("output {port} of node '{node}' cannot be shared: {reason}")]
    CannotShare {
        /// Node name.
        node: String,
        /// Output index.
        port: usize,
        /// Explanation.
        reason: &'static str,
    },
    /// Arity mismatch when connecting every port at once.
    #[error("cannot connect {outputs} outputs to {inputs} inputs")]
    ArityMismatch {
        /// Producer outputs.
        outputs: usize,
        /// Consumer inputs.
        inputs: usize,
    },
    /// A processor refused its properties.
    #[error("configuration rejected: {0}")]
    Rejected(String),
}

/// Failures raised by a stateless stage while being configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// A property is missing or out of range.
    #[error("invalid property '{key}': {reason}")]
    InvalidProperty {
        /// Property name.
        key: String,
        /// Explanation.
        reason: String,
    },
    /// The stage cannot handle the offered input types.
    #[error("rejected input types: {0}")]
    Rejected(String),
    /// Two stages cannot be fused.
    #[error("incompatible stages: {0}")]
    Incompatible(String),
}

impl StageError {
    /// Convenience constructor for [`StageError::InvalidProperty`].
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StageError::InvalidProperty {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<StageError> for ErrorKind {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Rejected(msg) => ErrorKind::InvalidInputs(msg),
            other => ErrorKind::Custom(other.to_string()),
        }
    }
}

/// One node's start-up failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// Name of the node.
    pub node: String,
    /// Why it failed.
    pub kind: ErrorKind,
}

impl core::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.node, self.kind)
    }
}

/// Aggregate report for a group that failed to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} node(s) failed to start: {}", failures.len(), join(failures))]
pub struct StartError {
    /// Every node that did not reach the running state.
    pub failures: Vec<NodeFailure>,
}

fn join(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_lists_every_failure() {
        let err = StartError {
            failures: vec![
                NodeFailure {
                    node: "window".into(),
                    kind: ErrorKind::InvalidInputs("needs a wave".into()),
                },
                NodeFailure {
                    node: "sum".into(),
                    kind: ErrorKind::RecursiveFailure(0),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 node(s) failed to start"));
        assert!(msg.contains("window: invalid inputs: needs a wave"));
        assert!(msg.contains("sum: upstream failure on input 0"));
    }

    #[test]
    fn port_context() {
        assert_eq!(ErrorKind::InputNotConnected(2).port(), Some(2));
        assert_eq!(ErrorKind::NotInitialized.port(), None);
        assert!(ErrorKind::Pending.is_transient());
        assert!(!ErrorKind::Custom("x".into()).is_transient());
    }

    #[test]
    fn stage_rejection_maps_to_invalid_inputs() {
        let kind: ErrorKind = StageError::Rejected("wave only".into()).into();
        assert_eq!(kind, ErrorKind::InvalidInputs("wave only".into()));
        let kind: ErrorKind = StageError::invalid("size", "must be > 0").into();
        assert!(matches!(kind, ErrorKind::Custom(_)));
    }
}
