use anyhow::Result;
use async_trait::async_trait;
use core_logic::{FarmingSession, FarmingStats};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::{ExecutionState, Orchestrator};

/// One user's run: their wallets, their airdrop selection.
pub struct UserSession {
    label: String,
    orchestrator: Orchestrator,
    airdrops: Vec<String>,
}

impl UserSession {
    pub fn new(label: impl Into<String>, orchestrator: Orchestrator, airdrops: Vec<String>) -> Self {
        Self {
            label: label.into(),
            orchestrator,
            airdrops,
        }
    }
}

#[async_trait]
impl FarmingSession for UserSession {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, cancellation_token: CancellationToken) -> Result<FarmingStats> {
        info!(
            "Starting farming with {} wallet(s) for: {}",
            self.orchestrator.wallets().len(),
            self.airdrops.join(", ")
        );
        let state = ExecutionState::with_token(self.airdrops.clone(), cancellation_token);
        let report = self.orchestrator.run(&state).await?;
        for line in report.summary().lines() {
            info!(target: "farm_result", "{}", line);
        }
        Ok(report.stats)
    }
}
