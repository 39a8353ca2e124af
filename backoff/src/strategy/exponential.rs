use std::time::Duration;

/// An Exponential Backoff strategy that multiplies the delay by `factor` with each retry.
///
/// The delay is calculated as: `base_interval * factor^(attempt - 1)`, capped at `max_interval`.
/// The iterator never ends on its own; bound it with `take(retries)`.
///
/// # Example
/// ```
/// use backoff::strategy::exponential::Exponential;
/// use std::time::Duration;
///
/// let mut backoff = Exponential::new(Duration::from_millis(100), 2.0);
///
/// assert_eq!(backoff.next(), Some(Duration::from_millis(100)));
/// assert_eq!(backoff.next(), Some(Duration::from_millis(200)));
/// assert_eq!(backoff.next(), Some(Duration::from_millis(400)));
/// ```
#[derive(Debug, Clone)]
pub struct Exponential {
    /// The delay before the first retry.
    base_interval: Duration,
    /// The maximum retry interval (cap).
    max_interval: Duration,
    /// The factor to multiply the interval with for each retry attempt.
    factor: f64,
    /// The current retry attempt count (tracks state across next() calls).
    current_attempt: u32,
}

impl Exponential {
    /// Creates a new uncapped Exponential backoff strategy.
    pub fn new(base_interval: Duration, factor: f64) -> Self {
        Self {
            base_interval,
            max_interval: Duration::MAX,
            factor,
            current_attempt: 0,
        }
    }

    /// Creates an Exponential backoff from milliseconds.
    pub fn from_millis(base_interval_ms: u64, factor: f64) -> Self {
        Self::new(Duration::from_millis(base_interval_ms), factor)
    }

    /// Caps every computed delay at `max_interval`.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Resets the backoff to its initial state.
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Returns how many delays have been handed out so far.
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Computes `base_interval * factor^(attempt - 1)`. Any overflow (or a factor that yields a
    /// non-finite value) saturates to `max_interval`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        // clamp attempt to at least 1 so the first delay is exactly the base interval.
        let exponent = i32::try_from(attempt.max(1) - 1).unwrap_or(i32::MAX);
        let nanos = (self.base_interval.as_nanos() as f64) * self.factor.powi(exponent);

        if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
            return self.max_interval;
        }
        Duration::from_nanos(nanos.round() as u64).min(self.max_interval)
    }
}

impl Iterator for Exponential {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.current_attempt = self.current_attempt.saturating_add(1);
        Some(self.calculate_delay(self.current_attempt))
    }
}
