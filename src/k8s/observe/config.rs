/**
 * Timing defaults for watch loops and condition pollers
 */
use std::time::Duration;

/// Initial backoff time in seconds
pub const INITIAL_BACKOFF_SECONDS: u64 = 1;

/// Maximum backoff time in seconds between reconnection attempts
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Budget for one reconnection cycle in seconds (0 retries until cancelled)
pub const DEFAULT_RETRY_TIMEOUT_SECONDS: u64 = 300;

/// Deadline for a single stream open attempt in seconds
pub const ATTEMPT_TIMEOUT_SECONDS: u64 = 30;

/// Server-side watch timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Default poll interval for condition waits in seconds
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 2;

/// Default condition wait timeout in seconds
pub const DEFAULT_WAIT_TIMEOUT_SECONDS: u64 = 300;

/// Default interval between pod health listings in seconds
pub const DEFAULT_MONITOR_INTERVAL_SECONDS: u64 = 10;

/// Converts a seconds setting where 0 means "no limit"
#[must_use]
pub const fn optional_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(INITIAL_BACKOFF_SECONDS > 0, "INITIAL_BACKOFF_SECONDS must be greater than 0");
    assert!(
        MAX_BACKOFF_SECONDS >= INITIAL_BACKOFF_SECONDS,
        "MAX_BACKOFF_SECONDS must not be below INITIAL_BACKOFF_SECONDS"
    );
    assert!(ATTEMPT_TIMEOUT_SECONDS > 0, "ATTEMPT_TIMEOUT_SECONDS must be greater than 0");
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(
        DEFAULT_POLL_INTERVAL_SECONDS > 0,
        "DEFAULT_POLL_INTERVAL_SECONDS must be greater than 0"
    );
    assert!(
        DEFAULT_MONITOR_INTERVAL_SECONDS > 0,
        "DEFAULT_MONITOR_INTERVAL_SECONDS must be greater than 0"
    );
};
