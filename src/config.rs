use chrono::TimeDelta;
use std::time::Duration;

/// Tunables for an [`EscrowEngine`](crate::application::engine::EscrowEngine).
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// Time after buyer confirmation during which the buyer may dispute.
    /// The seller may claim from the instant it closes.
    pub dispute_window: TimeDelta,
    /// Upper bound on a single direct transfer before falling back to the ledger.
    pub transfer_timeout: Duration,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            dispute_window: TimeDelta::days(1),
            transfer_timeout: Duration::from_secs(5),
        }
    }
}

impl EscrowConfig {
    pub fn with_dispute_window(mut self, window: TimeDelta) -> Self {
        self.dispute_window = window;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_is_one_day() {
        let config = EscrowConfig::default();
        assert_eq!(config.dispute_window, TimeDelta::seconds(86_400));
    }

    #[test]
    fn test_overrides() {
        let config = EscrowConfig::default()
            .with_dispute_window(TimeDelta::hours(2))
            .with_transfer_timeout(Duration::from_millis(250));
        assert_eq!(config.dispute_window, TimeDelta::hours(2));
        assert_eq!(config.transfer_timeout, Duration::from_millis(250));
    }
}
