use std::fmt;

/// Result type for excap-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the storage layer.
#[derive(Debug)]
pub enum Error {
    /// IO operation failed (artifact tree read/write, directory creation).
    Io(std::io::Error),
    /// The embedded event-log database returned an error.
    Database(rusqlite::Error),
    /// A stored JSON column failed to (de)serialize.
    Serialization(serde_json::Error),
    /// A referenced row does not exist (span, checkpoint, trace, artifact).
    NotFound(String),
    /// On-disk content doesn't match its recorded hash or declared shape.
    Corrupt(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Database(err) => write!(f, "database error: {}", err),
            Error::Serialization(err) => write!(f, "serialization error: {}", err),
            Error::NotFound(what) => write!(f, "not found: {}", what),
            Error::Corrupt(what) => write!(f, "corrupt store: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Database(err) => Some(err),
            Error::Serialization(err) => Some(err),
            Error::NotFound(_) | Error::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}

impl From<excap_types::Error> for Error {
    fn from(err: excap_types::Error) -> Self {
        match err {
            excap_types::Error::Io(e) => Error::Io(e),
            excap_types::Error::Serialization(e) => Error::Serialization(e),
        }
    }
}
