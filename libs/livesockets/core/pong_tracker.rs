//! Round-trip tracker
//!
//! Pings carry an epoch-millisecond timestamp; servers that echo it back
//! as `originalTimestamp` in their pong let us measure round-trip time.

use std::time::Duration;

/// Latest and smoothed round-trip time
#[derive(Debug, Default, Clone)]
pub struct PongTracker {
    last_ping_sent_ms: Option<i64>,
    last_round_trip: Option<Duration>,
    smoothed_ms: Option<f64>,
    samples: u64,
}

impl PongTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ping_sent(&mut self, timestamp_ms: i64) {
        self.last_ping_sent_ms = Some(timestamp_ms);
    }

    /// Record a pong echoing `original_timestamp_ms`, received at `now_ms`
    ///
    /// Returns the measured round trip; echoes from the future (clock skew
    /// or a bogus server value) are ignored.
    pub fn record_pong(&mut self, original_timestamp_ms: i64, now_ms: i64) -> Option<Duration> {
        let elapsed = now_ms.checked_sub(original_timestamp_ms)?;
        if elapsed < 0 {
            return None;
        }

        let rtt = Duration::from_millis(elapsed as u64);
        self.last_round_trip = Some(rtt);
        self.samples += 1;
        // EWMA, alpha = 1/8
        self.smoothed_ms = Some(match self.smoothed_ms {
            Some(prev) => prev + (elapsed as f64 - prev) / 8.0,
            None => elapsed as f64,
        });
        Some(rtt)
    }

    pub fn last_round_trip(&self) -> Option<Duration> {
        self.last_round_trip
    }

    pub fn smoothed_round_trip(&self) -> Option<Duration> {
        self.smoothed_ms.map(|ms| Duration::from_millis(ms.round() as u64))
    }

    pub fn last_ping_sent(&self) -> Option<i64> {
        self.last_ping_sent_ms
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Call this when reconnecting to start fresh
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_round_trip_before_first_pong() {
        let tracker = PongTracker::new();
        assert!(tracker.last_round_trip().is_none());
        assert!(tracker.smoothed_round_trip().is_none());
    }

    #[test]
    fn test_round_trip_from_echo() {
        let mut tracker = PongTracker::new();
        tracker.record_ping_sent(1_000);
        assert_eq!(tracker.record_pong(1_000, 1_042), Some(Duration::from_millis(42)));
        assert_eq!(tracker.last_round_trip(), Some(Duration::from_millis(42)));
        assert_eq!(tracker.smoothed_round_trip(), Some(Duration::from_millis(42)));
    }

    #[test]
    fn test_future_echo_ignored() {
        let mut tracker = PongTracker::new();
        assert!(tracker.record_pong(2_000, 1_000).is_none());
        assert_eq!(tracker.samples(), 0);
    }

    #[test]
    fn test_smoothing_and_reset() {
        let mut tracker = PongTracker::new();
        tracker.record_pong(0, 80);
        tracker.record_pong(0, 160);
        assert_eq!(tracker.smoothed_round_trip(), Some(Duration::from_millis(90)));
        assert_eq!(tracker.last_round_trip(), Some(Duration::from_millis(160)));

        tracker.reset();
        assert!(tracker.last_round_trip().is_none());
        assert_eq!(tracker.samples(), 0);
    }
}
