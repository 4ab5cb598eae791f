/**
 * Retrying watch loop
 *
 * Keeps a change stream open for one `WatchSpec`, reconnecting with backoff when
 * the stream cannot be opened or drops. Each reconnection cycle has its own
 * budget (`retry_timeout`), measured from the first attempt of the cycle. A
 * productive session (one that delivered events or stayed open for at least
 * `attempt_timeout`) ends the cycle; a session that closes early and empty counts
 * as a failed attempt.
 */
use super::backoff::{RetryPolicy, RetryState};
use super::config::{ATTEMPT_TIMEOUT_SECONDS, DEFAULT_RETRY_TIMEOUT_SECONDS};
use super::dispatch::{SessionEnd, dispatch_session};
use super::errors::ClientError;
use super::handler::HandlerSet;
use super::resource::ResourceKind;
use super::source::ResourceClient;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything one watch loop needs; owned by that loop for its lifetime
#[derive(Debug)]
pub struct WatchSpec {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub retry: RetryPolicy,
    /// Budget per reconnection cycle; `None` or zero retries until cancelled
    pub retry_timeout: Option<Duration>,
    /// Deadline for each individual open attempt
    pub attempt_timeout: Duration,
    pub handlers: HandlerSet,
}

impl WatchSpec {
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: Option<&str>, handlers: HandlerSet) -> Self {
        Self {
            kind,
            namespace: namespace.map(ToString::to_string),
            label_selector: None,
            field_selector: None,
            retry: RetryPolicy::default(),
            retry_timeout: Some(Duration::from_secs(DEFAULT_RETRY_TIMEOUT_SECONDS)),
            attempt_timeout: Duration::from_secs(ATTEMPT_TIMEOUT_SECONDS),
            handlers,
        }
    }

    #[must_use]
    pub fn labels(mut self, selector: &str) -> Self {
        self.label_selector = Some(selector.to_string()).filter(|s| !s.is_empty());
        self
    }

    #[must_use]
    pub fn fields(mut self, selector: &str) -> Self {
        self.field_selector = Some(selector.to_string()).filter(|s| !s.is_empty());
        self
    }

    #[must_use]
    pub const fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    #[must_use]
    pub const fn retry_timeout(mut self, budget: Option<Duration>) -> Self {
        self.retry_timeout = match budget {
            Some(budget) if budget.is_zero() => None,
            budget => budget,
        };
        self
    }

    #[must_use]
    pub const fn attempt_timeout(mut self, deadline: Duration) -> Self {
        self.attempt_timeout = deadline;
        self
    }

    /// Human readable target, e.g. `deployments.v1.apps in default (app=web)`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut target = format!(
            "{} in {}",
            self.kind,
            self.namespace.as_deref().unwrap_or("all namespaces")
        );
        if let Some(labels) = &self.label_selector {
            target.push_str(&format!(" ({labels})"));
        }
        if let Some(fields) = &self.field_selector {
            target.push_str(&format!(" [{fields}]"));
        }
        target
    }
}

/// What a watch loop did before it was cancelled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Streams that were opened successfully
    pub sessions: u32,
    /// Events handed to the handler set
    pub events: u64,
    /// Open attempts that failed, including early empty closes
    pub failed_attempts: u32,
}

#[derive(Debug, Error)]
pub enum WatchError {
    /// The retry budget ran out without a usable stream
    #[error(
        "watch establishment failed for {resource} after {attempts} attempts in {elapsed:?}: {last_error}"
    )]
    EstablishmentFailed {
        resource: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last_error: ClientError,
    },

    /// The server refused the watch in a way retrying cannot fix
    #[error("watch for {resource} rejected: {source}")]
    Rejected {
        resource: String,
        #[source]
        source: ClientError,
    },
}

/// One reconnection cycle
struct Cycle {
    started: Instant,
    attempts: u32,
}

impl Cycle {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            attempts: 0,
        }
    }
}

enum Attempt {
    Cancelled,
    OpenFailed(ClientError),
    Session {
        delivered: u64,
        open_for: Duration,
        end: SessionEnd,
    },
}

pub struct WatchLoop {
    spec: WatchSpec,
    retry: RetryState,
    stats: WatchStats,
    id: Uuid,
}

impl WatchLoop {
    #[must_use]
    pub fn new(spec: WatchSpec) -> Self {
        let retry = RetryState::new(spec.retry);
        Self {
            spec,
            retry,
            stats: WatchStats::default(),
            id: Uuid::new_v4(),
        }
    }

    /// Watch until cancelled.
    ///
    /// Returns `Ok` only when `cancel` fires, with a summary of what was observed.
    ///
    /// # Errors
    ///
    /// `WatchError::EstablishmentFailed` when a reconnection cycle exhausts its
    /// budget, `WatchError::Rejected` on the first non-transient error.
    pub async fn run<C>(
        mut self,
        client: &C,
        cancel: &CancellationToken,
    ) -> Result<WatchStats, WatchError>
    where
        C: ResourceClient + ?Sized,
    {
        let resource = self.spec.describe();
        info!("🔍 Starting watch {} for {}", self.id, resource);

        let mut cycle = Cycle::start();
        let mut last_error: Option<ClientError> = None;

        loop {
            if let Some(e) = last_error.take() {
                if let Some(remaining) = self.remaining(&cycle) {
                    if remaining.is_zero() {
                        return Err(self.exhausted(resource, &cycle, e));
                    }
                }
            }

            cycle.attempts += 1;
            let error = match self.attempt(client, &cycle, cancel).await {
                Attempt::Cancelled => return Ok(self.cancelled(&resource)),
                Attempt::OpenFailed(e) => e,
                Attempt::Session {
                    delivered,
                    open_for,
                    end,
                } => {
                    self.stats.sessions += 1;
                    self.stats.events += delivered;
                    if delivered > 0 {
                        self.retry.reset();
                    }
                    let productive = delivered > 0 || open_for >= self.spec.attempt_timeout;

                    match end {
                        SessionEnd::Cancelled => return Ok(self.cancelled(&resource)),
                        SessionEnd::Closed if productive => {
                            info!("🔍 Watch for {} ended normally, reconnecting...", resource);
                            self.retry.reset();
                            cycle = Cycle::start();
                            continue;
                        }
                        SessionEnd::Failed(e) if productive && e.is_transient() => {
                            warn!("⚠️ Watch for {} dropped: {}, reconnecting...", resource, e);
                            self.retry.reset();
                            cycle = Cycle::start();
                            continue;
                        }
                        SessionEnd::Closed => ClientError::Connection(
                            "stream closed before delivering any event".to_string(),
                        ),
                        SessionEnd::Failed(e) => e,
                    }
                }
            };

            if !error.is_transient() {
                error!("❌ Watch for {} rejected: {}", resource, error);
                return Err(WatchError::Rejected {
                    resource,
                    source: error,
                });
            }

            self.stats.failed_attempts += 1;
            let mut delay = self.retry.record_failure();
            if let Some(remaining) = self.remaining(&cycle) {
                if remaining.is_zero() {
                    return Err(self.exhausted(resource, &cycle, error));
                }
                delay = delay.min(remaining);
            }

            warn!(
                "❌ Watch for {} failed (attempt {}): {}, retrying in {:?}",
                resource, cycle.attempts, error, delay
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.cancelled(&resource)),
                () = sleep(delay) => {}
            }
        }
    }

    /// Open one stream and, if that works, drain it
    async fn attempt<C>(&mut self, client: &C, cycle: &Cycle, cancel: &CancellationToken) -> Attempt
    where
        C: ResourceClient + ?Sized,
    {
        let deadline = self
            .remaining(cycle)
            .map_or(self.spec.attempt_timeout, |remaining| {
                remaining.min(self.spec.attempt_timeout)
            });

        let open = client.open_stream(
            &self.spec.kind,
            self.spec.namespace.as_deref(),
            self.spec.label_selector.as_deref(),
            self.spec.field_selector.as_deref(),
        );

        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Attempt::Cancelled,
            opened = timeout(deadline, open) => match opened {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Attempt::OpenFailed(e),
                Err(_) => return Attempt::OpenFailed(ClientError::Timeout(deadline)),
            },
        };

        let session = Uuid::new_v4();
        debug!("📡 Watch {} opened session {}", self.id, session);
        let opened_at = Instant::now();
        let report = dispatch_session(stream, &mut self.spec.handlers, cancel).await;
        debug!(
            "📡 Watch {} session {} ended after {} events: {:?}",
            self.id, session, report.delivered, report.end
        );

        Attempt::Session {
            delivered: report.delivered,
            open_for: opened_at.elapsed(),
            end: report.end,
        }
    }

    /// Budget left in this cycle, `None` when unbounded
    fn remaining(&self, cycle: &Cycle) -> Option<Duration> {
        self.spec
            .retry_timeout
            .filter(|budget| !budget.is_zero())
            .map(|budget| budget.saturating_sub(cycle.started.elapsed()))
    }

    fn exhausted(&self, resource: String, cycle: &Cycle, last_error: ClientError) -> WatchError {
        let elapsed = cycle.started.elapsed();
        error!(
            "❌ Watch for {} could not be established after {} attempts in {:?}",
            resource, cycle.attempts, elapsed
        );
        WatchError::EstablishmentFailed {
            resource,
            attempts: cycle.attempts,
            elapsed,
            last_error,
        }
    }

    fn cancelled(self, resource: &str) -> WatchStats {
        info!(
            "🛑 Watch for {} cancelled after {} sessions, {} events",
            resource, self.stats.sessions, self.stats.events
        );
        self.stats
    }
}
