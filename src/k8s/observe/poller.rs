/**
 * Condition poller
 *
 * Fetches one object on a fixed cadence until a predicate holds or the deadline
 * passes. A missing object means "not yet"; any other fetch error ends the wait.
 */
use super::errors::ClientError;
use super::resource::{ResourceIdentity, Snapshot};
use super::source::ResourceClient;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stand-in for deadlines too far away to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn later(at: Instant, after: Duration) -> Instant {
    at.checked_add(after).unwrap_or_else(|| at + FAR_FUTURE)
}

/// Predicate over the observed state of the waited-on object
pub type Predicate = Box<dyn Fn(&Snapshot) -> bool + Send + Sync>;

/// One bounded wait on one object
pub struct WaitSpec {
    pub identity: ResourceIdentity,
    pub predicate: Predicate,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl WaitSpec {
    #[must_use]
    pub fn new<P>(identity: ResourceIdentity, predicate: P) -> Self
    where
        P: Fn(&Snapshot) -> bool + Send + Sync + 'static,
    {
        Self {
            identity,
            predicate: Box::new(predicate),
            poll_interval: Duration::from_secs(super::config::DEFAULT_POLL_INTERVAL_SECONDS),
            timeout: Duration::from_secs(super::config::DEFAULT_WAIT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for WaitSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitSpec")
            .field("identity", &self.identity)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// How a wait ended, when it did not fail
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    /// The predicate held for this snapshot
    Satisfied {
        snapshot: Snapshot,
        polls: u32,
        elapsed: Duration,
    },
    /// The deadline passed with the predicate never true
    TimedOut { polls: u32, elapsed: Duration },
    /// The caller gave up
    Cancelled { polls: u32 },
}

impl WaitOutcome {
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("failed to fetch {identity}: {source}")]
    Fetch {
        identity: ResourceIdentity,
        #[source]
        source: ClientError,
    },
}

/// Poll `spec.identity` until `spec.predicate` holds, the timeout passes or
/// `cancel` fires. The first poll happens immediately.
///
/// # Errors
///
/// `WaitError::Fetch` on the first fetch error other than not-found.
pub async fn poll_until<C>(
    client: &C,
    spec: WaitSpec,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, WaitError>
where
    C: ResourceClient + ?Sized,
{
    let started = Instant::now();
    let deadline = later(started, spec.timeout);
    let mut polls = 0;

    info!(
        "⏳ Waiting up to {:?} for {} (every {:?})",
        spec.timeout, spec.identity, spec.poll_interval
    );

    loop {
        let poll_started = Instant::now();
        if poll_started >= deadline {
            return Ok(timed_out(&spec, polls, started));
        }
        polls += 1;

        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled { polls }),
            fetched = timeout_at(deadline, client.fetch(&spec.identity)) => fetched,
        };

        match fetched {
            Err(_) => return Ok(timed_out(&spec, polls, started)),
            Ok(Ok(snapshot)) => {
                if (spec.predicate)(&snapshot) {
                    let elapsed = started.elapsed();
                    info!(
                        "✅ {} reached the desired state after {} polls ({:?})",
                        spec.identity, polls, elapsed
                    );
                    return Ok(WaitOutcome::Satisfied {
                        snapshot,
                        polls,
                        elapsed,
                    });
                }
                debug!("⏳ {} not ready yet (poll {})", spec.identity, polls);
            }
            Ok(Err(e)) if e.is_not_found() => {
                debug!("⏳ {} not found yet (poll {})", spec.identity, polls);
            }
            Ok(Err(e)) => {
                warn!("❌ Giving up on {}: {}", spec.identity, e);
                return Err(WaitError::Fetch {
                    identity: spec.identity,
                    source: e,
                });
            }
        }

        let wake = later(poll_started, spec.poll_interval).min(deadline);
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled { polls }),
            () = sleep_until(wake) => {}
        }
    }
}

fn timed_out(spec: &WaitSpec, polls: u32, started: Instant) -> WaitOutcome {
    let elapsed = started.elapsed();
    warn!(
        "⌛ Timed out after {:?} waiting for {} ({} polls)",
        elapsed, spec.identity, polls
    );
    WaitOutcome::TimedOut { polls, elapsed }
}
