//! Polling policy and clock abstraction.
//!
//! A [`RetryPolicy`] decides how long to wait before each attempt and
//! whether to give up; a [`Clock`] performs the wait.  Production code uses
//! [`TokioClock`]; tests use [`ManualClock`], which records the requested
//! delays and returns immediately.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Suspends the current task.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real time, via `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Records every requested sleep without waiting.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("mutex poisoned").clone()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.sleeps.lock().expect("mutex poisoned").push(duration);
        Box::pin(std::future::ready(()))
    }
}

/// Delay before attempt `n` (1-based) of the primary wait:
/// `min(5000, 500 + n * 250)` milliseconds.
pub fn primary_wait_interval(attempt: u32) -> Duration {
    let millis = 500u64.saturating_add(u64::from(attempt).saturating_mul(250));
    Duration::from_millis(millis.min(5000))
}

/// Interval schedule plus an optional attempt ceiling.
#[derive(Clone)]
pub struct RetryPolicy {
    interval: Arc<dyn Fn(u32) -> Duration + Send + Sync>,
    /// Maximum number of attempts (`None` = unbounded).
    pub max_attempts: Option<u32>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::primary_wait()
    }
}

impl RetryPolicy {
    pub fn new<F>(interval: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            interval: Arc::new(interval),
            max_attempts: None,
        }
    }

    /// The primary-wait schedule, unbounded.
    pub fn primary_wait() -> Self {
        Self::new(primary_wait_interval)
    }

    /// Fixed delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(move |_| delay)
    }

    /// Cap the number of attempts.
    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.interval)(attempt)
    }

    /// Whether another attempt may follow attempt `attempt`.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_wait_schedule() {
        let ms: Vec<u128> = (1..=6).map(|n| primary_wait_interval(n).as_millis()).collect();
        assert_eq!(ms, vec![750, 1000, 1250, 1500, 1750, 2000]);
    }

    #[test]
    fn test_primary_wait_caps_at_five_seconds() {
        assert_eq!(primary_wait_interval(18).as_millis(), 5000);
        assert_eq!(primary_wait_interval(19).as_millis(), 5000);
        assert_eq!(primary_wait_interval(u32::MAX).as_millis(), 5000);
    }

    #[test]
    fn test_primary_wait_non_decreasing() {
        let mut previous = Duration::ZERO;
        for n in 1..200 {
            let d = primary_wait_interval(n);
            assert!(d >= previous);
            assert!(d <= Duration::from_millis(5000));
            assert_eq!(d, Duration::from_millis((500 + n as u64 * 250).min(5000)));
            previous = d;
        }
    }

    #[test]
    fn test_unbounded_policy_always_retries() {
        let policy = RetryPolicy::primary_wait();
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(1_000_000));
    }

    #[test]
    fn test_max_attempts() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(Some(3));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert_eq!(policy.delay(7), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_manual_clock_records() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(750)).await;
        clock.sleep(Duration::from_millis(1000)).await;
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(750), Duration::from_millis(1000)]
        );
    }
}
