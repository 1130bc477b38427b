use std::error::Error as StdError;
use std::fmt::{self, Display};

use crate::library::Error as LibraryError;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The chat model failed, after retries if the failure was transient.
    Model,
    /// The embedding provider failed while searching tools.
    Embedding,
    /// The model did not follow the expected tool-calling protocol.
    Protocol,
    /// The model kept calling tools past the configured number of rounds.
    ToolRoundsExceeded,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Model => write!(f, "Model error"),
            ErrorKind::Embedding => write!(f, "Embedding error"),
            ErrorKind::Protocol => write!(f, "Protocol violation"),
            ErrorKind::ToolRoundsExceeded => write!(f, "Too many tool rounds"),
        }
    }
}

/// Describes why a query failed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: String,
}

impl Error {
    #[inline]
    pub(crate) fn new<S: Into<String>>(kind: ErrorKind, reason: S) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    #[inline]
    pub(crate) fn protocol<S: Into<String>>(reason: S) -> Self {
        Self::new(ErrorKind::Protocol, reason)
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl StdError for Error {}

impl From<LibraryError> for Error {
    fn from(err: LibraryError) -> Self {
        Self::new(ErrorKind::Embedding, err.reason())
    }
}
