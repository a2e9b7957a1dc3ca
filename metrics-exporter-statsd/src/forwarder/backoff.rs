use std::time::{Duration, Instant};

/// Longest delay allowed between reconnect attempts.
pub const LONGEST_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Capped exponential backoff between reconnect attempts.
///
/// Each failure doubles the delay, up to the configured maximum. A success resets it back to the initial delay.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a new `Backoff` with the given initial and maximum delay.
    ///
    /// If `max` is smaller than `initial`, `initial` is used as the maximum. Both are capped at [`LONGEST_DELAY`].
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(LONGEST_DELAY);
        let max = max.max(initial).min(LONGEST_DELAY);
        Self { initial, max, current: initial }
    }

    /// Records a failed attempt, returning the deadline before which no further attempt should be made.
    pub fn failed(&mut self, now: Instant) -> Instant {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);

        // `Instant` has no maximum value, so a deadline that can't be represented falls back to retrying right away.
        now.checked_add(delay).unwrap_or(now)
    }

    /// Records a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Returns the delay that the next failure will produce.
    pub fn current(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{Backoff, LONGEST_DELAY};

    #[test]
    fn doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(75));
        let now = Instant::now();

        let delays = (0..6).map(|_| backoff.failed(now) - now).collect::<Vec<_>>();
        let expected = [10, 20, 40, 75, 75, 75].map(Duration::from_millis);
        assert_eq!(delays, expected);
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));
        let now = Instant::now();

        backoff.failed(now);
        backoff.failed(now);
        assert_eq!(backoff.current(), Duration::from_millis(40));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(10));
    }

    #[test]
    fn zero_initial_delay_retries_immediately() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
        let now = Instant::now();
        assert_eq!(backoff.failed(now), now);
        assert_eq!(backoff.failed(now), now);
    }

    #[test]
    fn max_below_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(backoff.failed(now) - now, Duration::from_secs(2));
        assert_eq!(backoff.failed(now) - now, Duration::from_secs(2));
    }

    #[test]
    fn delays_are_capped() {
        let mut backoff = Backoff::new(Duration::MAX, Duration::MAX);
        assert_eq!(backoff.current(), LONGEST_DELAY);

        let now = Instant::now();
        assert_eq!(backoff.failed(now) - now, LONGEST_DELAY);
        assert_eq!(backoff.current(), LONGEST_DELAY);
    }
}
