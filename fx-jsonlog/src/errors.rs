use std::result;
use thiserror::Error;

/// The result type of logging operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type a [crate::Sink] can fail with, either synchronously or from its pending result.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// The errors of the json logging crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("log level \"{0}\" is invalid")]
    InvalidLevel(String),
    #[error("init fields are invalid, expected an object but got {0}")]
    InvalidInit(String),
    #[error("logger options are invalid, {0}")]
    InvalidOptions(String),
    #[error("child fields are missing")]
    MissingFields,
    #[error("child fields are invalid, expected an object but got {0}")]
    InvalidFields(String),
    #[error("sink failed to write the record, {0}")]
    Sink(SinkError),
}

impl Error {
    /// Returns the category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidLevel(_) | Error::InvalidInit(_) | Error::InvalidOptions(_) => {
                ErrorKind::Configuration
            }
            Error::MissingFields | Error::InvalidFields(_) => ErrorKind::Argument,
            Error::Sink(_) => ErrorKind::Sink,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::InvalidLevel(_), Error::InvalidLevel(_)) => true,
            (Error::InvalidInit(_), Error::InvalidInit(_)) => true,
            (Error::InvalidOptions(_), Error::InvalidOptions(_)) => true,
            (Error::MissingFields, Error::MissingFields) => true,
            (Error::InvalidFields(_), Error::InvalidFields(_)) => true,
            (Error::Sink(_), Error::Sink(_)) => true,
            _ => false,
        }
    }
}

impl From<SinkError> for Error {
    fn from(err: SinkError) -> Error {
        Error::Sink(err)
    }
}

/// The category of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The logger was constructed with an invalid configuration.
    Configuration,
    /// A logger operation was invoked with an invalid argument.
    Argument,
    /// The synchronous invocation of the output sink failed.
    Sink,
}
