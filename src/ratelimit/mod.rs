//! Rate limiting for GitHub API traffic.
//!
//! Each installation of a GitHub App has two budgets:
//!
//! - a *primary* limit (5000 requests/hour by default) that resets at a time
//!   reported in the `x-ratelimit-reset` header, and
//! - a *secondary* limit of 100 concurrent requests.
//!
//! [`RateLimitTransport`] enforces both: a [`HeaderThrottle`] that stops all
//! traffic once the primary budget runs low, and an [`AdmissionSemaphore`]
//! that caps requests in flight. Limits are per transport instance, so one
//! transport per installation keeps installations independent.

mod error;
mod info;
mod semaphore;
mod throttle;
mod transport;

pub use error::{AdmissionError, BuildError, SendError};
pub use info::{RateLimitInfo, RateLimitSource, HEADER_REMAINING, HEADER_RESET, HEADER_USED};
pub use semaphore::{AdmissionSemaphore, Slot};
pub use throttle::{Gate, HeaderThrottle};
pub use transport::{Admission, RateLimitTransport, Sender};

use std::future::Future;
use tokio::time::Instant;

/// Run `fut` to completion, or give up at `deadline`.
pub(crate) async fn with_deadline<F: Future>(
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output, AdmissionError> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| AdmissionError::Timeout),
        None => Ok(fut.await),
    }
}
