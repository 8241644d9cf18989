//! Backoff between retried attempts.
//!
//! The number of retries is a property of each [`Endpoint`](crate::Endpoint);
//! the client only decides how long to wait before each one.

use std::time::Duration;

/// Exponential backoff: `initial_delay * 2^attempt`, uncapped.
///
/// Callers bound the total wait through the endpoint's retry count.
///
/// # Examples
///
/// ```
/// use netpoint::retry::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::default();
///
/// // 200ms, 400ms, 800ms...
/// assert_eq!(backoff.delay_after(0), Duration::from_millis(200));
/// assert_eq!(backoff.delay_after(1), Duration::from_millis(400));
/// assert_eq!(backoff.delay_after(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial_delay: Duration,
}

impl Backoff {
    /// The delay before the first retry unless configured otherwise.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(200);

    /// Creates a backoff starting at `initial_delay`.
    pub fn new(initial_delay: Duration) -> Self {
        Self { initial_delay }
    }

    /// The delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns how long to wait after failed attempt `attempt` (0-based) before
    /// making attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(multiplier)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL_DELAY)
    }
}
