use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The embedding provider failed or returned an unusable result.
    Embedding,
    /// A tool with the same name is already in the library.
    AlreadyRegistered,
    /// No tool with the given name is in the library.
    NotFound,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Embedding => write!(f, "Embedding failed"),
            ErrorKind::AlreadyRegistered => write!(f, "Already registered"),
            ErrorKind::NotFound => write!(f, "Tool not found"),
        }
    }
}

/// Describes a tool library error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: String,
}

impl Error {
    #[inline]
    pub(crate) fn embedding<S: Into<String>>(reason: S) -> Self {
        Self {
            kind: ErrorKind::Embedding,
            reason: reason.into(),
        }
    }

    #[inline]
    pub(crate) fn already_registered(name: &str) -> Self {
        Self {
            kind: ErrorKind::AlreadyRegistered,
            reason: format!("tool `{name}` is already registered"),
        }
    }

    #[inline]
    pub(crate) fn not_found(name: &str) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            reason: format!("tool `{name}` is not registered"),
        }
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
