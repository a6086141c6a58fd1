use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed - normal operation
    #[serde(rename = "CLOSED")]
    Closed,
    /// Circuit is open - calls are blocked until the cooldown deadline
    #[serde(rename = "OPEN")]
    Open,
    /// Circuit is half-open - the next call is a probe
    #[serde(rename = "HALF_OPEN")]
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// How long an open circuit is skipped before a half-open probe
    pub cooldown: Duration,
    /// Maximum duration of a single guarded call
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
struct CircuitStats {
    state: CircuitState,
    consecutive_failures: usize,
    total_calls: u64,
    failed_calls: u64,
    opened_at: Option<Instant>,
}

/// Point-in-time view of a circuit, safe to hand to callers
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub total_calls: u64,
    pub failed_calls: u64,
    /// Remaining cooldown if the circuit is open
    pub cooldown_remaining: Option<Duration>,
}

/// Circuit breaker - per-backend failure tracking state machine
///
/// A probe success in half-open closes the circuit immediately; a probe
/// failure reopens it and resets the cooldown deadline.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    stats: RwLock<CircuitStats>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            stats: RwLock::new(CircuitStats {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_calls: 0,
                failed_calls: 0,
                opened_at: None,
            }),
        }
    }

    /// Check whether a call may go through right now.
    ///
    /// An open circuit whose cooldown deadline has elapsed transitions to
    /// half-open and admits exactly this call as the probe.
    pub async fn allow_call(&self) -> bool {
        let mut stats = self.stats.write().await;
        match stats.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = stats
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    stats.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub async fn record_success(&self) {
        let mut stats = self.stats.write().await;
        stats.total_calls += 1;
        stats.consecutive_failures = 0;
        stats.state = CircuitState::Closed;
        stats.opened_at = None;
    }

    /// Record a failed call
    pub async fn record_failure(&self) {
        let mut stats = self.stats.write().await;
        stats.total_calls += 1;
        stats.failed_calls += 1;
        stats.consecutive_failures += 1;

        match stats.state {
            CircuitState::Closed => {
                if stats.consecutive_failures >= self.config.failure_threshold {
                    stats.state = CircuitState::Open;
                    stats.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                // A failed probe reopens the circuit and restarts the cooldown
                stats.state = CircuitState::Open;
                stats.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {
                stats.opened_at = Some(Instant::now());
            }
        }
    }

    /// Get current circuit state
    pub async fn state(&self) -> CircuitState {
        self.stats.read().await.state
    }

    /// Get a point-in-time snapshot
    pub async fn snapshot(&self) -> CircuitSnapshot {
        let stats = self.stats.read().await;
        let cooldown_remaining = match stats.state {
            CircuitState::Open => stats
                .opened_at
                .map(|t| self.config.cooldown.saturating_sub(t.elapsed())),
            _ => None,
        };
        CircuitSnapshot {
            state: stats.state,
            consecutive_failures: stats.consecutive_failures,
            total_calls: stats.total_calls,
            failed_calls: stats.failed_calls,
            cooldown_remaining,
        }
    }

    /// Maximum duration of a single guarded call
    pub fn call_timeout(&self) -> Duration {
        self.config.call_timeout
    }

    /// Reset circuit breaker to the closed state
    pub async fn reset(&self) {
        let mut stats = self.stats.write().await;
        stats.state = CircuitState::Closed;
        stats.consecutive_failures = 0;
        stats.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(threshold: usize, cooldown_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
            call_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_state() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());

        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.allow_call().await);

        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_threshold() {
        let cb = CircuitBreaker::new(fast_config(3, 100));

        for _ in 0..3 {
            assert!(cb.allow_call().await);
            cb.record_failure().await;
        }

        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.allow_call().await);

        let snapshot = cb.snapshot().await;
        assert_eq!(snapshot.consecutive_failures, 3);
        assert!(snapshot.cooldown_remaining.is_some());
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_probe_closes() {
        let cb = CircuitBreaker::new(fast_config(2, 50));

        for _ in 0..2 {
            cb.record_failure().await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Cooldown elapsed: the next call is admitted as a probe
        assert!(cb.allow_call().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_probe_failure_reopens() {
        let cb = CircuitBreaker::new(fast_config(1, 50));

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cb.allow_call().await);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        // Cooldown restarted: calls remain blocked right away
        assert!(!cb.allow_call().await);
    }

    #[tokio::test]
    async fn test_circuit_breaker_reset() {
        let cb = CircuitBreaker::new(fast_config(1, 1000));
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        cb.reset().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        assert!(cb.allow_call().await);
    }
}
