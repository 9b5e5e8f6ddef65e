use super::error::{AdmissionError, BuildError, SendError};
use super::info::{RateLimitInfo, RateLimitSource};
use super::semaphore::{AdmissionSemaphore, Slot};
use super::throttle::{Gate, HeaderThrottle};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Whatever actually performs the request/response exchange.
///
/// Both outcomes expose any rate-limit headers they carry, so the throttle can
/// learn from error statuses as well as successes.
pub trait Sender: Send + Sync {
    type Request: Send;
    type Response: RateLimitSource + Send;
    type Error: RateLimitSource + Send;

    fn send(
        &self,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

impl<S: Sender> Sender for Arc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;

    fn send(
        &self,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).send(request)
    }
}

/// Wraps a [`Sender`] with both GitHub rate limits.
///
/// Every request passes the [`HeaderThrottle`] and then the
/// [`AdmissionSemaphore`] before it is forwarded. The throttle is checked
/// first so that a fully throttled API never parks concurrency slots.
#[derive(Debug)]
pub struct RateLimitTransport<S> {
    semaphore: AdmissionSemaphore,
    throttle: HeaderThrottle,
    sender: S,
}

/// A request that passed both gates and holds one concurrency slot.
///
/// Call [`Admission::release`] with the response's snapshot once the exchange
/// completes. Dropping it returns the slot without observing anything.
#[derive(Debug)]
#[must_use = "dropping an admission releases its slot immediately"]
pub struct Admission<'a> {
    slot: Slot<'a>,
    throttle: &'a HeaderThrottle,
}

impl Admission<'_> {
    pub fn release(self, info: Option<RateLimitInfo>) {
        self.slot.release();
        if let Some(info) = info {
            self.throttle.observe(info);
        }
    }
}

impl<S> RateLimitTransport<S> {
    /// Limit `sender` to `max_concurrent` requests in flight, and stop all
    /// traffic whenever the remaining primary quota is at or below
    /// `max_concurrent`.
    ///
    /// The throttle's worker runs on the current Tokio runtime; outside one
    /// this fails with [`BuildError::NoRuntime`].
    pub fn new(sender: S, max_concurrent: usize) -> Result<Self, BuildError> {
        let threshold = i64::try_from(max_concurrent).unwrap_or(i64::MAX);
        Self::with_threshold(sender, max_concurrent, threshold)
    }

    /// Like [`new`](Self::new) with an explicit throttle threshold.
    pub fn with_threshold(
        sender: S,
        max_concurrent: usize,
        threshold: i64,
    ) -> Result<Self, BuildError> {
        if max_concurrent == 0 {
            return Err(BuildError::ZeroCapacity);
        }
        if max_concurrent > AdmissionSemaphore::MAX_CAPACITY {
            return Err(BuildError::CapacityTooLarge(max_concurrent));
        }
        if threshold < 0 {
            return Err(BuildError::NegativeThreshold(threshold));
        }
        let throttle = HeaderThrottle::new(threshold)?;
        Ok(Self {
            semaphore: AdmissionSemaphore::new(max_concurrent),
            throttle,
            sender,
        })
    }

    /// Wait for both gates, giving up at `deadline`.
    ///
    /// Cancel-safe: dropping the future while it waits consumes no slot.
    pub async fn acquire(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Admission<'_>, AdmissionError> {
        self.throttle.acquire(deadline).await?;
        let slot = self.semaphore.acquire(deadline).await?;
        Ok(Admission {
            slot,
            throttle: &self.throttle,
        })
    }

    /// Close both gates. Requests already admitted finish normally; waiters
    /// parked on the throttle are released and then rejected. Idempotent.
    pub fn close(&self) {
        self.semaphore.close();
        self.throttle.close();
    }

    pub fn max_concurrent(&self) -> usize {
        self.semaphore.capacity()
    }

    pub fn in_flight(&self) -> usize {
        self.semaphore.outstanding()
    }

    pub fn throttle_state(&self) -> Gate {
        self.throttle.state()
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }
}

impl<S: Sender> RateLimitTransport<S> {
    /// Send `request` once both gates admit it.
    ///
    /// The slot is returned whether the exchange succeeds, fails, or the
    /// caller drops this future mid-flight. Any rate-limit headers on the
    /// outcome are then fed to the throttle. The sender's result is returned
    /// as-is.
    pub async fn send(
        &self,
        request: S::Request,
        deadline: Option<Instant>,
    ) -> Result<S::Response, SendError<S::Error>> {
        let admission = self.acquire(deadline).await?;
        let result = self.sender.send(request).await;
        let info = match &result {
            Ok(response) => response.rate_limit(),
            Err(err) => err.rate_limit(),
        };
        admission.release(info);
        result.map_err(SendError::Transport)
    }
}
