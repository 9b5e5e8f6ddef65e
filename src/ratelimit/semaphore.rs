use super::error::AdmissionError;
use super::with_deadline;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Bounded counting gate limiting the number of requests in flight.
///
/// Slots are interchangeable, so this is a plain counting semaphore with a
/// cancellable acquire.
#[derive(Debug)]
pub struct AdmissionSemaphore {
    permits: Semaphore,
    capacity: usize,
}

/// One acquired slot. Released exactly once, on [`Slot::release`] or drop.
#[derive(Debug)]
#[must_use = "dropping a slot releases it immediately"]
pub struct Slot<'a> {
    _permit: SemaphorePermit<'a>,
}

impl Slot<'_> {
    pub fn release(self) {}
}

impl AdmissionSemaphore {
    pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

    /// Panics if `capacity` exceeds [`Self::MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Wait for a free slot until `deadline` (forever if `None`).
    ///
    /// Cancel-safe: dropping the future before it resolves consumes nothing.
    pub async fn acquire(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Slot<'_>, AdmissionError> {
        let permit = with_deadline(deadline, self.permits.acquire())
            .await?
            .map_err(|_| AdmissionError::Closed)?;
        Ok(Slot { _permit: permit })
    }

    /// Reject all future acquisitions. Slots already handed out stay valid.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn outstanding(&self) -> usize {
        self.capacity.saturating_sub(self.permits.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn soon(ms: u64) -> Option<Instant> {
        Some(Instant::now() + Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn full_semaphore_times_out() {
        let sem = AdmissionSemaphore::new(1);
        let _held = sem.acquire(None).await.unwrap();
        assert_eq!(sem.outstanding(), 1);

        let err = sem.acquire(soon(10)).await.unwrap_err();
        assert_eq!(err, AdmissionError::Timeout);
        assert_eq!(sem.outstanding(), 1);
    }

    #[tokio::test]
    async fn release_frees_the_slot() {
        let sem = AdmissionSemaphore::new(1);
        for _ in 0..3 {
            let slot = sem.acquire(None).await.unwrap();
            slot.release();
        }
        assert_eq!(sem.outstanding(), 0);
    }

    #[tokio::test]
    async fn release_wakes_a_waiter() {
        let sem = std::sync::Arc::new(AdmissionSemaphore::new(1));
        let held = sem.acquire(None).await.unwrap();

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(soon(1_000)).await.map(|s| s.release()) })
        };
        tokio::task::yield_now().await;
        held.release();
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn closed_semaphore_rejects_immediately() {
        let sem = AdmissionSemaphore::new(2);
        let outstanding = sem.acquire(None).await.unwrap();
        sem.close();
        assert!(sem.is_closed());
        assert_eq!(sem.acquire(None).await.unwrap_err(), AdmissionError::Closed);
        // Returning a slot after close is harmless.
        outstanding.release();
        assert_eq!(sem.acquire(None).await.unwrap_err(), AdmissionError::Closed);
    }

    #[tokio::test]
    async fn close_wakes_parked_acquirers() {
        let sem = std::sync::Arc::new(AdmissionSemaphore::new(1));
        let _held = sem.acquire(None).await.unwrap();
        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(None).await.map(|s| s.release()) })
        };
        tokio::task::yield_now().await;
        sem.close();
        assert_eq!(waiter.await.unwrap(), Err(AdmissionError::Closed));
    }
}
