use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for `excap-sdk`. Composes the sibling crates' own
/// `Error` types rather than flattening them into strings, so embedders can
/// match on `source()` when they need to.
#[derive(Debug)]
pub enum Error {
    /// Resource not found (trace, checkpoint, span).
    NotFound(String),
    /// Invalid input parameters.
    InvalidInput(String),
    /// Error from the storage layer (`excap-store`).
    Store(excap_store::Error),
    /// Error from the trace-context/parallel-execution layer
    /// (`excap-runtime`).
    Runtime(excap_runtime::Error),
    /// Error from the phase state machine (`excap-phases`).
    Phase(excap_phases::Error),
    /// Workspace/config resolution failure (`EXCAP_PATH`, `config.toml`).
    Config(anyhow::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Store(err) => write!(f, "{}", err),
            Error::Runtime(err) => write!(f, "{}", err),
            Error::Phase(err) => write!(f, "{}", err),
            Error::Config(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Runtime(err) => Some(err),
            Error::Phase(err) => Some(err),
            Error::Config(err) => Some(err.as_ref()),
            Error::NotFound(_) | Error::InvalidInput(_) => None,
        }
    }
}

impl From<excap_store::Error> for Error {
    fn from(err: excap_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<excap_runtime::Error> for Error {
    fn from(err: excap_runtime::Error) -> Self {
        Error::Runtime(err)
    }
}

impl From<excap_phases::Error> for Error {
    fn from(err: excap_phases::Error) -> Self {
        Error::Phase(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err)
    }
}
