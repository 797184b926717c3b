use std::fmt;

/// Result type for excap-runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the trace-context and parallel-execution
/// layer.
#[derive(Debug)]
pub enum Error {
    /// The underlying trace/artifact store returned an error.
    Store(excap_store::Error),
    /// A tool call was refused by a phase-aware dispatch helper built on top
    /// of this crate (disallowed tool, exhausted budget, resume of a forked
    /// checkpoint). Never raised by the Parallel Executor itself, which has
    /// no phase awareness.
    PolicyViolation(String),
    /// A worker thread terminated without producing a result (panic,
    /// disconnected channel).
    WorkerPanicked(String),
    /// Checkpoint state failed to (de)serialize into the caller's state
    /// types.
    Serialization(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "store error: {}", err),
            Error::PolicyViolation(msg) => write!(f, "policy violation: {}", msg),
            Error::WorkerPanicked(msg) => write!(f, "worker panicked: {}", msg),
            Error::Serialization(err) => write!(f, "serialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Serialization(err) => Some(err),
            Error::PolicyViolation(_) | Error::WorkerPanicked(_) => None,
        }
    }
}

impl From<excap_store::Error> for Error {
    fn from(err: excap_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}
