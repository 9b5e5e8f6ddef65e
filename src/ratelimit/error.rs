use thiserror::Error;

/// Why a request was not admitted past the rate-limit gates.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("deadline elapsed while waiting for admission")]
    Timeout,
    #[error("rate limiter is closed")]
    Closed,
}

/// Rejected construction parameters.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("max_concurrent must be at least 1")]
    ZeroCapacity,
    #[error("max_concurrent {0} exceeds the supported maximum")]
    CapacityTooLarge(usize),
    #[error("throttle threshold must not be negative (got {0})")]
    NegativeThreshold(i64),
    #[error("the rate limiter must be created inside a Tokio runtime")]
    NoRuntime,
}

/// Outcome of a failed [`send`](crate::ratelimit::RateLimitTransport::send).
///
/// Transport errors are passed through untouched; the rate limiter never
/// retries or rewrites them.
#[derive(Debug, Error)]
pub enum SendError<E> {
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Transport(E),
}

impl<E> SendError<E> {
    pub fn is_admission(&self) -> bool {
        matches!(self, SendError::Admission(_))
    }

    /// The wrapped sender's error, if that is what failed.
    pub fn into_transport(self) -> Option<E> {
        match self {
            SendError::Transport(e) => Some(e),
            SendError::Admission(_) => None,
        }
    }
}
