//! Wait - Poll a remote entity until it reaches a target status
//!
//! The poller is the single transition-waiting primitive used by every
//! driver. It owns no state between calls; each wait is one blocking loop
//! bounded by its timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Default total wait per operation (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// Default grace period before the first poll
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
/// Default minimum spacing between successive polls
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(3);
/// Default number of consecutive not-found results tolerated
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Errors returned by [`StateChangeConf::await_state`]
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        target.join(", ")
    )]
    Timeout {
        last_state: String,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error(transparent)]
    Refresh(E),
}

impl<E> WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Last status observed before the wait failed, if any
    pub fn last_state(&self) -> Option<&str> {
        match self {
            WaitError::Timeout { last_state, .. } if !last_state.is_empty() => Some(last_state),
            WaitError::UnexpectedState { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Convergence request: which statuses to tolerate and which to wait for
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// Transient statuses that keep the loop going
    pub pending: Vec<String>,
    /// Statuses that end the wait successfully
    pub target: Vec<String>,
    /// Upper bound on the whole wait, including the initial delay
    pub timeout: Duration,
    /// Grace period before the first poll
    pub delay: Duration,
    /// Lower bound on the backoff between polls
    pub min_timeout: Duration,
    /// Fixed spacing between polls; overrides the backoff when set
    pub poll_interval: Option<Duration>,
    /// Consecutive not-found results tolerated before failing
    pub not_found_checks: u32,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str]) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll `refresh` until it reports a target status.
    ///
    /// `refresh` yields `Some((snapshot, status))` when the entity is visible
    /// and `None` when it is not (an empty status counts as not visible).
    /// Refresh errors abort immediately; a status outside both `pending` and
    /// `target` aborts on the poll that observed it.
    pub async fn await_state<T, E, F, Fut>(&self, mut refresh: F) -> Result<T, WaitError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, E>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();
        let mut not_found = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        tokio::time::sleep(self.delay.min(self.timeout)).await;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(last_state));
            }

            let observed = match tokio::time::timeout(remaining, refresh()).await {
                Ok(result) => result.map_err(WaitError::Refresh)?,
                Err(_) => return Err(self.timed_out(last_state)),
            };

            match observed {
                Some((snapshot, state)) if !state.is_empty() => {
                    not_found = 0;
                    log::debug!("[wait] observed state '{}'", state);
                    if self.target.contains(&state) {
                        return Ok(snapshot);
                    }
                    if !self.pending.contains(&state) {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    last_state = state;
                }
                _ => {
                    not_found += 1;
                    log::debug!(
                        "[wait] resource not visible ({}/{})",
                        not_found,
                        self.not_found_checks
                    );
                    if not_found > self.not_found_checks {
                        return Err(WaitError::NotFound {
                            checks: self.not_found_checks,
                        });
                    }
                }
            }

            let interval = match self.poll_interval {
                Some(interval) => interval,
                None => {
                    let wait = backoff.max(self.min_timeout);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    wait
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(last_state));
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    fn timed_out<E>(&self, last_state: String) -> WaitError<E>
    where
        E: std::error::Error + 'static,
    {
        WaitError::Timeout {
            last_state,
            target: self.target.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("api unavailable")]
    struct ApiDown;

    type Observed = Result<Option<(String, String)>, ApiDown>;

    /// Refresh function replaying `states`, repeating the last one forever
    fn scripted(
        states: &[&str],
    ) -> (
        impl FnMut() -> std::future::Ready<Observed>,
        Arc<AtomicUsize>,
    ) {
        let states: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let state = states[n.min(states.len() - 1)].clone();
            let observed = if state.is_empty() {
                None
            } else {
                Some((format!("snapshot-{}", n), state))
            };
            std::future::ready(Ok(observed))
        };
        (refresh, calls)
    }

    fn conf() -> StateChangeConf {
        StateChangeConf::new(&["activating", "active"], &["active"])
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_target_returns_after_delay_only() {
        let (refresh, calls) = scripted(&["active"]);
        let start = Instant::now();

        let snapshot = conf().await_state(refresh).await.unwrap();

        assert_eq!(snapshot, "snapshot-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), DEFAULT_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_then_target() {
        let (refresh, calls) = scripted(&["activating", "activating", "active"]);

        let snapshot = conf().await_state(refresh).await.unwrap();

        assert_eq!(snapshot, "snapshot-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_forever_times_out_within_budget() {
        let (refresh, _calls) = scripted(&["activating"]);
        let timeout = Duration::from_secs(30);
        let start = Instant::now();

        let err = StateChangeConf::new(&["activating"], &["active"])
            .with_timeout(timeout)
            .await_state(refresh)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.last_state(), Some("activating"));
        assert!(start.elapsed() <= timeout);
        assert!(err.to_string().contains("last state: 'activating'"));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_fails_on_first_observation() {
        let (refresh, calls) = scripted(&["error"]);

        let err = conf().await_state(refresh).await.unwrap_err();

        assert!(matches!(
            err,
            WaitError::UnexpectedState { ref state, .. } if state == "error"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_after_pending_stops_immediately() {
        let (refresh, calls) = scripted(&["activating", "purged", "active"]);

        let err = conf().await_state(refresh).await.unwrap_err();

        assert_eq!(err.last_state(), Some("purged"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<Option<(String, String)>, _>(ApiDown))
        };

        let err = conf().await_state(refresh).await.unwrap_err();

        assert!(matches!(err, WaitError::Refresh(ApiDown)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_budget_is_exhausted() {
        let (refresh, calls) = scripted(&[""]);

        let err = conf()
            .with_not_found_checks(3)
            .await_state(refresh)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::NotFound { checks: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_counter_resets_when_seen() {
        let (refresh, calls) = scripted(&["", "", "activating", "", "", "active"]);

        let snapshot = conf()
            .with_not_found_checks(2)
            .await_state(refresh)
            .await
            .unwrap();

        assert_eq!(snapshot, "snapshot-5");
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_poll_interval_spaces_polls() {
        let (refresh, _calls) = scripted(&["activating", "activating", "active"]);
        let start = Instant::now();

        conf()
            .with_delay(Duration::ZERO)
            .with_poll_interval(Duration::from_secs(5))
            .await_state(refresh)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_respects_min_timeout() {
        let (refresh, _calls) = scripted(&["activating", "active"]);
        let start = Instant::now();

        conf().await_state(refresh).await.unwrap();

        assert_eq!(start.elapsed(), DEFAULT_DELAY + DEFAULT_MIN_TIMEOUT);
    }
}
