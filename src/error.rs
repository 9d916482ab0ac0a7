//! Failure taxonomy shared by the session, the read loop and the scheduler.
//!
//! Every failure inside a connection attempt collapses into exactly one
//! [`ErrorCategory`]. Transport-level details live in [`TransportError`] and
//! never cross the session boundary.

/// Coarse classification of a failed connection attempt.
///
/// The category selects the backoff curve used before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport or I/O failure, including a buffer that filled up without
    /// ever yielding a document
    Network,

    /// The server answered with a 4xx/5xx status other than 420
    HttpError,

    /// The server answered with status 420
    RateLimited,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::HttpError => write!(f, "http_error"),
            ErrorCategory::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Errors raised while opening or reading the streaming connection.
#[derive(Debug)]
pub enum TransportError {
    /// HTTP request failed
    Request(reqwest::Error),

    /// Connect or read timed out
    Timeout,

    /// Lower-level I/O failure
    Io(std::io::Error),
}

impl TransportError {
    /// Every transport failure is a network-class failure.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "HTTP request failed: {}", e),
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Request(e) => Some(e),
            TransportError::Io(e) => Some(e),
            TransportError::Timeout => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout
        } else {
            TransportError::Io(err)
        }
    }
}
