use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream kept failing after {attempts} attempts: {last}")]
    TransientExhausted { attempts: u32, last: String },
}

/// Outcome of a single upstream attempt. `Busy` marks a server-overload
/// response that is worth retrying but still carries a usable response,
/// so the last one can be handed back once attempts run out.
pub enum Attempt<T> {
    Ready(T),
    Busy(T),
}

/// Seam for injecting delays in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded-retry wrapper with exponential backoff for transient upstream
/// failures: overload responses and transport-level faults. Other error
/// classes are returned on the first attempt.
#[derive(Clone)]
pub struct Retrier {
    max_attempts: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

impl Retrier {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run `op` up to `max_attempts` times. A `Busy` attempt or a transport
    /// error triggers a backoff sleep and another try. When attempts are
    /// exhausted the last obtained response is returned as-is, so callers
    /// must still check its status. If no attempt produced a response at
    /// all, `FetchError::TransientExhausted` surfaces the last fault.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, String>>,
    {
        let mut delay = self.base_delay;
        let mut last_busy: Option<T> = None;
        let mut last_fault = String::new();

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(Attempt::Ready(value)) => return Ok(value),
                Ok(Attempt::Busy(value)) => {
                    warn!(
                        target = "dealscout.retry",
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "upstream busy, backing off"
                    );
                    last_busy = Some(value);
                }
                Err(fault) => {
                    warn!(
                        target = "dealscout.retry",
                        attempt,
                        error = %fault,
                        delay_secs = delay.as_secs_f64(),
                        "transport fault, backing off"
                    );
                    last_fault = fault;
                }
            }
            if attempt < self.max_attempts {
                self.sleeper.sleep(delay).await;
                delay *= 2;
            }
        }

        match last_busy {
            Some(value) => Ok(value),
            None => Err(FetchError::TransientExhausted {
                attempts: self.max_attempts,
                last: last_fault,
            }),
        }
    }
}
