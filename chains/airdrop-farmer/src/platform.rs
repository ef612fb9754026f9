//! Off-chain platform adapters.
//!
//! Discord and Twitter clients plug in through [`PlatformAdapter`]; without
//! one, their actions are logged and reported as not completed.

use anyhow::Result;
use async_trait::async_trait;
use core_logic::PlatformAdapter;
use std::fmt::Debug;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredAdapter {
    platform: &'static str,
}

impl UnconfiguredAdapter {
    pub fn discord() -> Self {
        Self { platform: "discord" }
    }

    pub fn twitter() -> Self {
        Self { platform: "twitter" }
    }
}

#[async_trait]
impl<A> PlatformAdapter<A> for UnconfiguredAdapter
where
    A: Debug + Send + Sync + 'static,
{
    fn platform(&self) -> &str {
        self.platform
    }

    async fn perform_action(&self, action: &A) -> Result<bool> {
        warn!(
            "No {} client configured, skipping {:?}",
            self.platform, action
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TwitterAction;

    #[tokio::test]
    async fn test_unconfigured_reports_not_completed() {
        let adapter = UnconfiguredAdapter::twitter();
        let action = TwitterAction::Tweet { text: "gm".into() };
        let done = PlatformAdapter::<TwitterAction>::perform_action(&adapter, &action)
            .await
            .unwrap();
        assert!(!done);
        assert_eq!(PlatformAdapter::<TwitterAction>::platform(&adapter), "twitter");
    }
}
