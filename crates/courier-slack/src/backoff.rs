use std::time::Duration;

/// Retry pacing for the delivery engine. A policy value is handed to each
/// delivery call so callers (and tests) can tune or replace it wholesale.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt after `attempt` (1-based). A server-supplied
    /// Retry-After always wins over the computed schedule.
    pub fn delay_for(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        if let Some(requested) = retry_after {
            return requested;
        }
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
