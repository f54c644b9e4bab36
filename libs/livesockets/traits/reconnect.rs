use rand::Rng;
use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the manager waits before
/// each retry after an abnormal close.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the given reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt number (1-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if another attempt is allowed
    fn should_reconnect(&self, attempt: u32) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delays grow as `initial_delay * multiplier^(attempt-1)`, capped at
/// `max_delay`, then scaled by a uniform random jitter factor so that many
/// clients dropped together do not retry in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    multiplier: f64,
    jitter: (f64, f64),
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy with a 1.5x multiplier
    /// and `[0.8, 1.1]` jitter
    ///
    /// # Arguments
    /// * `initial_delay` - The delay before the first retry
    /// * `max_delay` - Cap applied before jitter
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
            multiplier: 1.5,
            jitter: (0.8, 1.1),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter range; `(1.0, 1.0)` disables jitter
    pub fn with_jitter(mut self, low: f64, high: f64) -> Self {
        self.jitter = (low, high);
        self
    }

    /// Jitter-free delay for an attempt
    pub fn expected_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jitter_factor(&self) -> f64 {
        let (low, high) = self.jitter;
        if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let expected = self.expected_delay(attempt).as_millis() as f64;
        Some(Duration::from_millis((expected * self.jitter_factor()) as u64))
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Never reconnect strategy
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: u32) -> bool {
        false
    }
}
