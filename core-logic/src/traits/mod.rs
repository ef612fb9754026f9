use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FarmingStats {
    pub success: u64,
    pub failed: u64,
}

impl FarmingStats {
    pub fn record(&mut self, success: bool) {
        if success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: &FarmingStats) {
        self.success += other.success;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u64 {
        self.success + self.failed
    }
}

/// One user's farming run, driven by the [`crate::SessionRunner`].
#[async_trait]
pub trait FarmingSession: Send + Sync {
    /// Identifier used in the session's log span
    fn label(&self) -> &str;

    /// Runs until all work is done or the token is cancelled
    async fn run(&self, cancellation_token: CancellationToken) -> Result<FarmingStats>;
}

/// An off-chain platform (Discord, Twitter, ...) that can perform a farming action.
///
/// Implementations own their authentication and rate limiting; the engine
/// only cares about the completion signal.
#[async_trait]
pub trait PlatformAdapter<A>: Send + Sync {
    /// Returns the platform name
    fn platform(&self) -> &str;

    /// Establishes the session with the platform, if it needs one
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Performs the action, `Ok(false)` meaning it did not complete
    async fn perform_action(&self, action: &A) -> Result<bool>;
}

#[async_trait]
pub trait WalletLoader: Send + Sync {
    type Wallet;

    /// Load wallets from a source (JSON file, key list, etc.)
    async fn load_wallets(&self) -> Result<Vec<Self::Wallet>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_and_merge() {
        let mut a = FarmingStats::default();
        a.record(true);
        a.record(false);
        a.record(true);

        let mut b = FarmingStats::default();
        b.record(false);
        b.merge(&a);

        assert_eq!(b.success, 2);
        assert_eq!(b.failed, 2);
        assert_eq!(b.total(), 4);
    }
}
