use std::{future::Future, time::Duration};

use tracing::debug;

use crate::router::{DeliveryError, RetryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: u32, max_delay: Duration },
}

/// Caller-side retry policy. The router never retries on its own; call sites
/// that need a precondition (a context being attached, a transcript being
/// loaded, a page control being rendered) poll with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    pub const fn exponential(
        delay: Duration,
        factor: u32,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            delay,
            max_attempts,
            backoff: Backoff::Exponential { factor, max_delay },
        }
    }

    /// Waiting for another context's state (e.g. transcript loaded): 500ms x 40.
    pub const fn readiness() -> Self {
        Self::fixed(Duration::from_millis(500), 40)
    }

    /// Waiting for host page controls to render: 1s x 10.
    pub const fn dom_affordance() -> Self {
        Self::fixed(Duration::from_secs(1), 10)
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let exp = attempt.saturating_sub(1).min(16);
                let mult = factor.max(1).saturating_pow(exp);
                self.delay.saturating_mul(mult).min(max_delay)
            }
        }
    }

    /// Polls `ready` until it returns true, at most `max_attempts` times.
    pub async fn wait_until(
        &self,
        what: &str,
        mut ready: impl FnMut() -> bool,
    ) -> Result<(), RetryError> {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            if ready() {
                return Ok(());
            }
            if attempt < attempts {
                debug!(what, attempt, attempts, "not ready, retrying");
                tokio::time::sleep(self.delay_after(attempt)).await;
            }
        }
        Err(RetryError::Exhausted {
            what: what.to_string(),
            attempts,
        })
    }

    /// Re-issues `op` while it fails with [`DeliveryError::NotReady`]; any other
    /// delivery failure is returned immediately.
    pub async fn retry_until_ready<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_not_ready() => {
                    if attempt < attempts {
                        debug!(what, attempt, attempts, error = %e, "receiver not ready, retrying");
                        tokio::time::sleep(self.delay_after(attempt)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RetryError::Exhausted {
            what: what.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;
    use crate::router::{Address, TabId};

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy =
            RetryPolicy::exponential(Duration::from_millis(100), 2, Duration::from_millis(500), 8);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_succeeds_once_flag_flips() {
        let mut polls = 0;
        let result = RetryPolicy::readiness()
            .wait_until("flag", || {
                polls += 1;
                polls == 3
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gives_up() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10), 4);
        let mut polls = 0;
        let err = policy
            .wait_until("controls", || {
                polls += 1;
                false
            })
            .await
            .unwrap_err();
        assert_eq!(polls, 4);
        assert_eq!(
            err,
            RetryError::Exhausted {
                what: "controls".to_string(),
                attempts: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_only_not_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::fixed(Duration::from_millis(10), 5);

        let c = Arc::clone(&calls);
        let value = policy
            .retry_until_ready("content", || {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DeliveryError::NotReady {
                            to: Address::Content(TabId(1)),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let err = policy
            .retry_until_ready("content", || async {
                Err::<(), _>(DeliveryError::NoRoute {
                    from: Address::Panel(TabId(1)),
                    to: Address::Background,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Delivery(DeliveryError::NoRoute { .. })));
    }
}
