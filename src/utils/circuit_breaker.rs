use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards an unreliable collaborator (the payment gateway). After
// `failure_threshold` consecutive failures the circuit opens and calls are
// refused without reaching the collaborator. Once `open_timeout` has elapsed
// a trial call is let through (half-open); `success_threshold` successes
// close it again, any failure reopens it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0=Closed, 1=Open, 2=HalfOpen
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "super::serde_millis")]
    pub open_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("{0}")]
    OperationFailed(E),
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    inner: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            })),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` unless the circuit is open
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::CircuitOpen(self.name.to_string()));
        }

        match operation.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!(breaker = %self.name, "Circuit breaker transitioning to HalfOpen");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                }
                elapsed
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.config.success_threshold {
                tracing::info!(
                    breaker = %self.name,
                    successes = inner.half_open_successes,
                    "Circuit breaker closing"
                );
                inner.state = CircuitState::Closed;
                inner.half_open_successes = 0;
                inner.opened_at = None;
            }
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if should_open {
            tracing::warn!(
                breaker = %self.name,
                failures = inner.consecutive_failures,
                "Circuit breaker opening"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.half_open_successes = 0;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Manually close the circuit
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                open_timeout,
                success_threshold: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            let result = cb.call(async { Err::<(), _>("error") }).await;
            assert!(matches!(result, Err(CircuitBreakerError::OperationFailed(_))));
        }

        assert_eq!(cb.state(), CircuitState::Open);
        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(2, Duration::from_secs(60));

        let _ = cb.call(async { Err::<(), _>("error") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;
        let _ = cb.call(async { Err::<(), _>("error") }).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_circuit() {
        let cb = breaker(1, Duration::from_millis(20));

        let _ = cb.call(async { Err::<(), _>("error") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let result = cb.call(async { Ok::<_, &str>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(20));
        let _ = cb.call(async { Err::<(), _>("error") }).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let _ = cb.call(async { Err::<(), _>("still down") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
