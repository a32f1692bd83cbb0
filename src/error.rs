pub type Result<T> = std::result::Result<T, Error>;

/// An error from a serial engine call
///
/// A timeout is never an error: reads and writes that run out of time return the number of bytes
/// transferred so far, which may be zero.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A buffer or length argument was rejected before any I/O took place
    #[error("Invalid argument: `{0}`")]
    InvalidArgument(&'static str),

    /// The descriptor is not registered with the abort registry
    #[error("Invalid handle")]
    InvalidHandle,

    /// A read was cancelled by an abort signal
    #[error("Read aborted")]
    AbortedRead,

    /// A write was cancelled by an abort signal
    #[error("Write aborted")]
    AbortedWrite,

    /// The underlying OS call failed
    #[error("IO error: `{0}`")]
    Io(#[from] std::io::Error),

    /// An open-time parameter was rejected
    #[error("Configuration error: `{0}`")]
    Configuration(String),

    /// Nothing matched a discovery request
    #[error("Not found: `{0}`")]
    NotFound(String),
}

impl Error {
    /// Stable numeric status code for host glue that reports errors as integers
    ///
    /// Codes are negative so that a host API can return either a byte count or a code from the
    /// same integer.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -1,
            Error::InvalidHandle => -2,
            Error::AbortedRead => -3,
            Error::AbortedWrite => -4,
            Error::Io(_) => -5,
            Error::Configuration(_) => -6,
            Error::NotFound(_) => -7,
        }
    }

    /// Whether this error is one of the two cancellation outcomes
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::AbortedRead | Error::AbortedWrite)
    }
}

impl From<rustix::io::Errno> for Error {
    fn from(e: rustix::io::Errno) -> Self {
        Error::Io(e.into())
    }
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => Error::NotFound(e.description),
            serialport::ErrorKind::InvalidInput => Error::Configuration(e.description),
            serialport::ErrorKind::Io(kind) => Error::Io(std::io::Error::new(kind, e.description)),
            serialport::ErrorKind::Unknown => Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.description,
            )),
        }
    }
}
