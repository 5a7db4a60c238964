//! Bounded polling for remote state transitions.
//!
//! Every wait sleeps before fetching, grows the interval geometrically up to a
//! cap, and gives up with [`Error::TimedOut`] once the cumulative sleep reaches
//! the budget. Fetch errors are returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Sleep schedule for one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub timeout: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, timeout: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 1.5,
            timeout,
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::from_secs_f64(next.min(self.max.as_secs_f64()))
    }
}

/// Sleep, fetch, repeat until `is_settled` accepts the fetched value.
pub async fn wait_until<T, F, Fut, P>(
    what: &str,
    backoff: &Backoff,
    mut fetch: F,
    mut is_settled: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let mut interval = backoff.initial;
    let mut waited = Duration::ZERO;
    let mut attempts = 0u32;

    loop {
        if waited >= backoff.timeout {
            warn!(what, ?waited, attempts, "Polling budget exhausted");
            return Err(Error::TimedOut {
                what: what.to_string(),
                waited,
            });
        }

        let pause = interval.min(backoff.timeout - waited);
        debug!(what, ?pause, attempts, "Waiting before next poll");
        tokio::time::sleep(pause).await;
        waited += pause;
        attempts += 1;

        let value = fetch().await?;
        if is_settled(&value) {
            debug!(what, ?waited, attempts, "Remote state settled");
            return Ok(value);
        }
        interval = backoff.next_interval(interval);
    }
}
