use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletSource {
    File { path: String },
    Env { key: String },
}

/// Random wait window between two farming steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayConfig {
    pub min_wait_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min_wait_secs: 30,
            max_wait_secs: 90,
        }
    }
}

impl DelayConfig {
    pub fn new(min_wait_secs: u64, max_wait_secs: u64) -> Self {
        Self {
            min_wait_secs,
            max_wait_secs,
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.max_wait_secs == 0
    }

    /// Picks a wait in `[min, max]`; an inverted window collapses to `min`.
    pub fn random_delay(&self) -> Duration {
        if self.max_wait_secs <= self.min_wait_secs {
            return Duration::from_secs(self.min_wait_secs);
        }
        let secs = rand::thread_rng().gen_range(self.min_wait_secs..=self.max_wait_secs);
        Duration::from_secs(secs)
    }
}
