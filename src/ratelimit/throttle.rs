use super::error::{AdmissionError, BuildError};
use super::info::RateLimitInfo;
use super::with_deadline;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{sleep_until, Instant};

/// Admission state of a [`HeaderThrottle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    /// Every admission waits until this instant.
    ClosedUntil(Instant),
}

impl Gate {
    /// Whether an acquire at `now` may pass. A closure whose instant has
    /// already been reached admits even before the worker reopens the gate.
    pub fn admits(&self, now: Instant) -> bool {
        match self {
            Gate::Open => true,
            Gate::ClosedUntil(until) => *until <= now,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Gate::Open)
    }
}

/// All-or-nothing gate driven by GitHub's primary rate-limit headers.
///
/// The gate starts open. When an observed response reports
/// `remaining <= threshold`, a single background worker closes it until the
/// reported reset time and reopens it when its timer fires. Observations are
/// processed one at a time in submission order; those arriving during a
/// closure wait in the queue, so a closure is never shortened or extended by
/// a later snapshot.
#[derive(Debug)]
pub struct HeaderThrottle {
    threshold: i64,
    observations: mpsc::UnboundedSender<Observation>,
    gate: watch::Receiver<Gate>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

impl HeaderThrottle {
    /// Start the throttle and its worker on the current Tokio runtime.
    ///
    /// Fails with [`BuildError::NoRuntime`] when called outside one.
    pub fn new(threshold: i64) -> Result<Self, BuildError> {
        let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;
        let (observations, rx) = mpsc::unbounded_channel();
        let (gate_tx, gate) = watch::channel(Gate::Open);
        let shutdown = Arc::new(Notify::new());
        runtime.spawn(manage_throttle(rx, gate_tx, threshold, shutdown.clone()));
        Ok(Self {
            threshold,
            observations,
            gate,
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    /// Wait until the gate admits, or until `deadline`.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<(), AdmissionError> {
        if self.is_closed() {
            return Err(AdmissionError::Closed);
        }
        let mut gate = self.gate.clone();
        let admitted = with_deadline(deadline, gate.wait_for(|g| g.admits(Instant::now())))
            .await?
            .map(|_| ())
            .map_err(|_| AdmissionError::Closed);
        admitted
    }

    /// Queue a snapshot for evaluation. Never blocks; ignored after close.
    ///
    /// The reset time is pinned to the monotonic clock here, so a snapshot
    /// that waits in the queue behind a closure is already stale by the time
    /// the worker reaches it.
    pub fn observe(&self, info: RateLimitInfo) {
        if self.is_closed() {
            return;
        }
        let until = Instant::now() + info.wait();
        // Fails only if the worker is already gone, which means we are closing.
        let _ = self.observations.send(Observation { info, until });
    }

    /// Stop the worker and force the gate open so no waiter stays parked.
    /// Later acquires fail with [`AdmissionError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shutdown.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn state(&self) -> Gate {
        *self.gate.borrow()
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }
}

impl Drop for HeaderThrottle {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug)]
struct Observation {
    info: RateLimitInfo,
    until: Instant,
}

async fn manage_throttle(
    mut observations: mpsc::UnboundedReceiver<Observation>,
    gate: watch::Sender<Gate>,
    threshold: i64,
    shutdown: Arc<Notify>,
) {
    loop {
        let Observation { info, until } = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            next = observations.recv() => match next {
                Some(observation) => observation,
                None => break,
            },
        };

        if !info.is_valid() {
            debug!("ignoring response without rate-limit headers");
            continue;
        }
        if info.remaining > threshold {
            continue;
        }
        let now = Instant::now();
        if until <= now {
            debug!(
                "remaining={} at or below threshold={} but reset {:?} has passed",
                info.remaining,
                threshold,
                info.reset_at()
            );
            continue;
        }

        let wait = until - now;
        gate.send_replace(Gate::ClosedUntil(until));
        warn!(
            "primary rate limit nearly exhausted (remaining={}, threshold={}); pausing requests for {:?} until {}",
            info.remaining,
            threshold,
            wait,
            info.reset_at().unwrap_or_default()
        );

        tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            _ = sleep_until(until) => {}
        }
        gate.send_replace(Gate::Open);
        info!("primary rate limit window reset; resuming requests");
    }
    gate.send_replace(Gate::Open);
    debug!("header throttle worker stopped");
}
