use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

/// Absolute cap on probes, whatever the timeout/interval ratio.
const MAX_POLLS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let ratio = timeout.as_millis() / interval.as_millis();
        let max_polls = u32::try_from(ratio)
            .unwrap_or(MAX_POLLS)
            .saturating_add(1)
            .min(MAX_POLLS);
        Self {
            timeout,
            interval,
            max_polls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { polls: u32 },
    TimedOut { polls: u32, waited: Duration },
}

/// Re-run `probe` against `subject` until it returns `true`, the timeout
/// elapses, or `max_polls` probes have run, sleeping `interval` in between.
pub async fn poll_until<S, F>(subject: &mut S, policy: &PollPolicy, mut probe: F) -> PollOutcome
where
    S: ?Sized + Send,
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, bool>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    while polls < policy.max_polls.max(1) {
        polls += 1;
        if probe(&mut *subject).await {
            return PollOutcome::Satisfied { polls };
        }
        if started.elapsed() >= policy.timeout {
            break;
        }
        tracing::debug!(polls, "condition not met, polling again");
        tokio::time::sleep(policy.interval).await;
    }

    PollOutcome::TimedOut {
        polls,
        waited: started.elapsed(),
    }
}
