//! Rate-limit backoff
//!
//! After a throttled call the connector sleeps until one second past the
//! advertised reset time, but never less than a minimum wait. A reset time
//! already in the past therefore still costs `min_wait`.

use std::time::{Duration, SystemTime};

/// Default lower bound on any rate-limit wait
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(10);

/// Margin added past the reset time
const RESET_MARGIN: Duration = Duration::from_secs(1);

/// How long to wait before retrying a throttled call
///
/// Computes `max(reset - now + 1s, min_wait)`.
pub fn rate_limit_wait(reset: SystemTime, now: SystemTime, min_wait: Duration) -> Duration {
    let until_reset = match reset.duration_since(now) {
        Ok(ahead) => ahead + RESET_MARGIN,
        Err(behind) => RESET_MARGIN.saturating_sub(behind.duration()),
    };

    until_reset.max(min_wait)
}
