//! Bounded polling for things that show up eventually, such as a
//! verification email.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(thiserror::Error, Debug)]
pub enum PollError<E> {
    #[error("Condition not met within {waited:?}")]
    Timeout { waited: Duration },
    #[error(transparent)]
    Probe(E),
}

/// Call `probe` until it yields a value or `timeout` elapses.
///
/// Attempts are spaced `interval` apart, the last sleep being cut short
/// so the deadline is honoured. An error from `probe` ends the poll
/// immediately.
pub async fn poll<T, E, F, Fut>(
    mut probe: F,
    interval: Duration,
    timeout: Duration,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(value) = probe().await.map_err(PollError::Probe)? {
            tracing::debug!(attempts, "Poll succeeded");
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::debug!(attempts, ?elapsed, "Poll timed out");
            return Err(PollError::Timeout { waited: elapsed });
        }

        sleep(interval.min(timeout.saturating_sub(elapsed))).await;
    }
}
