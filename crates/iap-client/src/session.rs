use std::time::Duration;

use iap_config::ReconnectConfig;
use serde::{Deserialize, Serialize};

/// Connection Session state.
///
/// `Disconnected -> Connecting -> Connected`; transport loss moves
/// `Connected -> Connecting`. `Connecting -> Disconnected` only happens when a
/// bounded [`ReconnectPolicy`] runs out of attempts, or on `release()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Exponential backoff between connection attempts.
///
/// Attempt `n` (1-based) that fails waits `initial * 2^(n-1)`, capped at
/// `max`, before attempt `n + 1`. `max_attempts = None` retries forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    /// No delay, unbounded. For tests and deterministic simulations.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: None,
        }
    }

    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_attempts: cfg.max_attempts,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another attempt may follow failed attempt `attempt`.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        let p = ReconnectPolicy {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(1),
            max_attempts: None,
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(250));
        assert_eq!(p.delay_for(2), Duration::from_millis(500));
        assert_eq!(p.delay_for(3), Duration::from_secs(1));
        assert_eq!(p.delay_for(40), Duration::from_secs(1), "no overflow");
    }

    #[test]
    fn unbounded_by_default() {
        let p = ReconnectPolicy::default();
        assert!(p.allows_retry(10_000));
        assert_eq!(p.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn bounded_policy_stops_at_limit() {
        let p = ReconnectPolicy::immediate().with_max_attempts(3);
        assert!(p.allows_retry(1));
        assert!(p.allows_retry(2));
        assert!(!p.allows_retry(3));
        assert_eq!(p.delay_for(2), Duration::ZERO);
    }
}
