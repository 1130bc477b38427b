//! Bounded retries with exponential backoff for provider calls.

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::future::retry_notify;
use tulip_model::ModelProviderError;

pub(crate) type BoxedError = Box<dyn ModelProviderError>;

/// How failed model and embedding calls are retried.
///
/// Only transient failures (see [`ErrorKind::is_transient`]) are retried.
/// The delay between attempts grows exponentially from `initial_interval`
/// by `multiplier`, capped at `max_interval`, and each delay is jittered by
/// `randomization_factor`. After `max_retries` retries the last error is
/// returned.
///
/// [`ErrorKind::is_transient`]: tulip_model::ErrorKind::is_transient
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[inline]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Sets the number of retries after the first attempt.
    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[inline]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the upper bound of the delay between two attempts.
    #[inline]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets the growth factor of the delay.
    #[inline]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Sets the jitter, `0.0` disables it.
    #[inline]
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Returns the number of retries after the first attempt.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            randomization_factor: 0.5,
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy
/// runs out of retries.
pub(crate) async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, BoxedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BoxedError>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_multiplier(policy.multiplier)
        .with_randomization_factor(policy.randomization_factor)
        .with_max_elapsed_time(None)
        .build();

    let max_retries = policy.max_retries;
    let mut operation = operation;
    let mut attempts = 0_u32;
    retry_notify(
        backoff,
        || {
            attempts += 1;
            let attempt = attempts;
            let fut = operation();
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() && attempt <= max_retries {
                        backoff::Error::transient(err)
                    } else {
                        if attempt > 1 {
                            error!("giving up after {attempt} attempts: {err}");
                        }
                        backoff::Error::permanent(err)
                    }
                })
            }
        },
        |err: BoxedError, delay: Duration| {
            warn!("transient failure ({err}), retrying in {delay:?}");
        },
    )
    .await
}
