use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    InvalidTransition(String),
    MissingOutputs(Vec<String>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidTransition(msg) => write!(f, "invalid phase transition: {}", msg),
            Error::MissingOutputs(outputs) => {
                write!(f, "cannot advance: missing required outputs: {}", outputs.join(", "))
            }
        }
    }
}

impl std::error::Error for Error {}
