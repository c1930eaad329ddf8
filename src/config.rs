use std::path::PathBuf;
use std::time::Duration;

/// How often interest is credited unless configured otherwise.
pub const DEFAULT_INTEREST_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted interest period (ten years). Longer periods are clamped.
pub const MAX_INTEREST_INTERVAL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Runtime settings for a [`crate::application::LedgerService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Directory holding the customer, account and transaction stores
    pub data_dir: PathBuf,
    /// Directory statements are written to
    pub statement_dir: PathBuf,
    /// Period of the background interest run; `None` disables the scheduler
    pub interest_interval: Option<Duration>,
}

impl LedgerConfig {
    /// Stores and statements in `data_dir`, interest once a day.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            statement_dir: data_dir.clone(),
            data_dir,
            interest_interval: Some(DEFAULT_INTEREST_INTERVAL),
        }
    }

    pub fn with_statement_dir(mut self, statement_dir: impl Into<PathBuf>) -> Self {
        self.statement_dir = statement_dir.into();
        self
    }

    pub fn with_interest_interval(mut self, interval: Duration) -> Self {
        self.interest_interval = Some(interval);
        self
    }

    pub fn without_scheduler(mut self) -> Self {
        self.interest_interval = None;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::new("/var/lib/tally");
        assert_eq!(config.statement_dir, PathBuf::from("/var/lib/tally"));
        assert_eq!(config.interest_interval, Some(DEFAULT_INTEREST_INTERVAL));
    }

    #[test]
    fn test_builders() {
        let config = LedgerConfig::new("data")
            .with_statement_dir("out")
            .without_scheduler();
        assert_eq!(config.statement_dir, PathBuf::from("out"));
        assert_eq!(config.interest_interval, None);

        let config = config.with_interest_interval(Duration::from_secs(5));
        assert_eq!(config.interest_interval, Some(Duration::from_secs(5)));
    }
}
