use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if a request failing with this kind may succeed when
    /// it is sent again unchanged.
    #[inline]
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Moderated)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::Other => write!(f, "Other"),
        }
    }
}
