//! Sequences one user's farming run: airdrops, then wallets, then actions.
//!
//! Strictly sequential so a wallet never races itself on nonces. The stop
//! token is checked before every airdrop, wallet and action, and it also
//! interrupts waits and receipt polling.

use anyhow::{bail, Result};
use core_logic::{DelayConfig, FarmingStats};
use ethers::types::Address;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{ActionExecutor, ActionOutcome, ActionSpec, Platform};
use crate::catalog::{AirdropDefinition, Catalog};
use crate::chain::{sequence_nonces, ChainWallet, PreparedTx};
use crate::config::PlatformWaits;

/// Shared between the running task and whoever started it.
#[derive(Debug)]
pub struct ExecutionState {
    airdrops_to_execute: Vec<String>,
    statuses: RwLock<BTreeMap<String, bool>>,
    started: AtomicBool,
    finished: AtomicBool,
    stop: CancellationToken,
}

impl ExecutionState {
    pub fn new(airdrops_to_execute: Vec<String>) -> Self {
        Self::with_token(airdrops_to_execute, CancellationToken::new())
    }

    /// Stops when `stop` (or a parent token) is cancelled.
    pub fn with_token(airdrops_to_execute: Vec<String>, stop: CancellationToken) -> Self {
        Self {
            airdrops_to_execute,
            statuses: RwLock::new(BTreeMap::new()),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            stop,
        }
    }

    pub fn airdrops_to_execute(&self) -> &[String] {
        &self.airdrops_to_execute
    }

    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub async fn statuses(&self) -> BTreeMap<String, bool> {
        self.statuses.read().await.clone()
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    fn is_selected(&self, name: &str) -> bool {
        self.airdrops_to_execute.iter().any(|n| n == name)
    }
}

/// What the caller needs for its user-facing summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub statuses: BTreeMap<String, bool>,
    pub stopped: bool,
    /// Per action, across every wallet
    pub stats: FarmingStats,
}

impl RunReport {
    pub fn succeeded(&self) -> Vec<&str> {
        self.with_status(true)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.with_status(false)
    }

    fn with_status(&self, wanted: bool) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, ok)| **ok == wanted)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.stopped {
            return "Farming was stopped.".to_string();
        }
        let mut lines = Vec::new();
        if !self.succeeded().is_empty() {
            lines.push(format!(
                "Airdrops completed successfully: {}",
                self.succeeded().join(", ")
            ));
        }
        if !self.failed().is_empty() {
            lines.push(format!(
                "Airdrops with errors (check the logs): {}",
                self.failed().join(", ")
            ));
        }
        if lines.is_empty() {
            lines.push("No airdrop was executed.".to_string());
        }
        lines.join("\n")
    }
}

/// Waits between actions: a random window, or a fixed wait per platform.
#[derive(Debug, Clone, Default)]
pub struct DelayPolicy {
    pub window: DelayConfig,
    pub per_platform: PlatformWaits,
}

impl DelayPolicy {
    pub fn none() -> Self {
        Self {
            window: DelayConfig::none(),
            per_platform: PlatformWaits::default(),
        }
    }

    pub fn after(&self, platform: Option<Platform>) -> Duration {
        match platform.and_then(|p| self.per_platform.get(p)) {
            Some(secs) => Duration::from_secs(secs),
            None => self.window.random_delay(),
        }
    }
}

enum AirdropRun {
    Completed(bool),
    Stopped,
}

pub struct Orchestrator {
    catalog: Arc<Catalog>,
    wallets: Vec<ChainWallet>,
    executor: Arc<dyn ActionExecutor>,
    delays: DelayPolicy,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        wallets: Vec<ChainWallet>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            catalog,
            wallets,
            executor,
            delays: DelayPolicy::default(),
        }
    }

    pub fn with_delays(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    pub fn active_airdrops(&self) -> Vec<&AirdropDefinition> {
        self.catalog.active()
    }

    pub fn wallets(&self) -> &[ChainWallet] {
        &self.wallets
    }

    /// Runs every selected, activated airdrop for every wallet.
    ///
    /// Action failures never abort the run. `state` is finished when this
    /// returns; a state that already ran is refused.
    pub async fn run(&self, state: &ExecutionState) -> Result<RunReport> {
        if state.started.swap(true, Ordering::SeqCst) {
            bail!("A farming run is already in progress or done for this state");
        }

        let mut stats = FarmingStats::default();
        self.run_airdrops(state, &mut stats).await;
        state.finished.store(true, Ordering::SeqCst);

        let report = RunReport {
            statuses: state.statuses().await,
            stopped: state.stop_requested(),
            stats,
        };
        info!(
            target: "farm_result",
            "Run finished: {} airdrop(s) recorded, {} action(s) succeeded, {} failed{}",
            report.statuses.len(),
            report.stats.success,
            report.stats.failed,
            if report.stopped { " (stopped)" } else { "" }
        );
        Ok(report)
    }

    async fn run_airdrops(&self, state: &ExecutionState, stats: &mut FarmingStats) {
        if self.catalog.has_discord_action() {
            if let Err(e) = self.executor.connect_discord().await {
                error!("Could not connect to Discord: {:#}", e);
            }
        }

        let selected: Vec<&AirdropDefinition> = self
            .catalog
            .airdrops()
            .iter()
            .filter(|a| a.is_activated && state.is_selected(&a.name))
            .collect();
        if selected.is_empty() {
            info!("No airdrop to execute");
            return;
        }

        for (i, airdrop) in selected.iter().enumerate() {
            if state.stop_requested() {
                return;
            }
            info!("Executing actions for {} airdrop", airdrop.name);

            match self.execute_airdrop(airdrop, state, stats).await {
                AirdropRun::Completed(success) => {
                    state
                        .statuses
                        .write()
                        .await
                        .insert(airdrop.name.clone(), success);
                    info!("Finished actions for {} airdrop", airdrop.name);
                }
                AirdropRun::Stopped => {
                    warn!("Farming stopped during {} airdrop", airdrop.name);
                    return;
                }
            }

            if i + 1 < selected.len() && !self.pause(None, state).await {
                return;
            }
        }
    }

    async fn execute_airdrop(
        &self,
        airdrop: &AirdropDefinition,
        state: &ExecutionState,
        stats: &mut FarmingStats,
    ) -> AirdropRun {
        let actions: Vec<&ActionSpec> = airdrop.active_actions().collect();
        if actions.is_empty() {
            info!("No active actions found for {} airdrop.", airdrop.name);
            return AirdropRun::Completed(false);
        }

        let mut success = true;
        for wallet in &self.wallets {
            if state.stop_requested() {
                return AirdropRun::Stopped;
            }
            for (i, action) in actions.iter().enumerate() {
                if state.stop_requested() {
                    return AirdropRun::Stopped;
                }

                let ok = self.execute_action(airdrop, action, wallet, state).await;
                stats.record(ok);
                success &= ok;

                if i + 1 < actions.len() && !self.pause(Some(action.platform()), state).await {
                    return AirdropRun::Stopped;
                }
            }
        }
        AirdropRun::Completed(success)
    }

    async fn execute_action(
        &self,
        airdrop: &AirdropDefinition,
        action: &ActionSpec,
        wallet: &ChainWallet,
        state: &ExecutionState,
    ) -> bool {
        info!(
            "Executing action '{}' for {} airdrop with {}",
            action.label(),
            airdrop.name,
            wallet.checksum()
        );

        match self.executor.execute(action, wallet, state.stop_token()).await {
            Ok(outcome) => {
                log_outcome(airdrop, action, &outcome);
                outcome.is_success()
            }
            Err(e) => {
                error!(
                    target: "farm_result",
                    "FAILED An error occurred while executing {} action for {} airdrop : {:#}",
                    action.platform(),
                    airdrop.name,
                    e
                );
                debug!("{:?}", e);
                false
            }
        }
    }

    /// `false` when the wait was interrupted by a stop request.
    async fn pause(&self, platform: Option<Platform>, state: &ExecutionState) -> bool {
        let wait = self.delays.after(platform);
        if wait.is_zero() {
            tokio::task::yield_now().await;
            return !state.stop_requested();
        }

        info!(
            "Waiting for {} seconds before executing the next {}",
            wait.as_secs(),
            if platform.is_some() { "action" } else { "airdrop" }
        );
        tokio::select! {
            _ = state.stop.cancelled() => false,
            _ = sleep(wait) => true,
        }
    }

    /// Builds the unsigned transactions of the named airdrops' `defi`
    /// actions for `address`, with their fee preview.
    pub async fn prepare_transactions(
        &self,
        airdrop_names: &[String],
        address: Address,
    ) -> Vec<PreparedTx> {
        info!("Preparing DeFi transactions");
        let wallet = ChainWallet::watch_only(address);
        let cancel = CancellationToken::new();
        let mut prepared = Vec::new();

        for name in airdrop_names {
            let airdrop = match self.catalog.get(name) {
                Some(airdrop) => airdrop,
                None => {
                    error!("Airdrop {} not found", name);
                    continue;
                }
            };
            if !airdrop.is_activated {
                continue;
            }

            for action in airdrop
                .active_actions()
                .filter(|a| a.platform() == Platform::Defi)
            {
                match self.executor.execute(action, &wallet, &cancel).await {
                    Ok(ActionOutcome::Prepared(txs)) => prepared.extend(txs),
                    Ok(other) => warn!(
                        "{} of {} produced no transaction: {:?}",
                        action.label(),
                        name,
                        other
                    ),
                    Err(e) => error!("Cannot prepare {} of {}: {:#}", action.label(), name, e),
                }
            }
        }
        sequence_nonces(&mut prepared);
        prepared
    }
}

fn log_outcome(airdrop: &AirdropDefinition, action: &ActionSpec, outcome: &ActionOutcome) {
    let label = action.label();
    match outcome {
        ActionOutcome::Submitted {
            success: true,
            explorer_link,
            ..
        } => info!(
            target: "farm_result",
            "SUCCESS {} for {} airdrop : {}", label, airdrop.name, explorer_link
        ),
        ActionOutcome::Submitted {
            success: false,
            explorer_link,
            ..
        } => warn!(
            target: "farm_result",
            "FAILED {} for {} airdrop reverted : {}", label, airdrop.name, explorer_link
        ),
        ActionOutcome::Prepared(txs) => info!(
            target: "farm_result",
            "Prepared {} unsigned transaction(s) for {} of {} airdrop",
            txs.len(),
            label,
            airdrop.name
        ),
        ActionOutcome::Completed(true) => info!(
            target: "farm_result",
            "SUCCESS {} for {} airdrop", label, airdrop.name
        ),
        ActionOutcome::Completed(false) => warn!(
            target: "farm_result",
            "FAILED {} for {} airdrop did not complete", label, airdrop.name
        ),
        ActionOutcome::NoResult => error!(
            target: "farm_result",
            "FAILED Due to an error while executing {} action for {} airdrop, skipping this action.",
            action.platform(),
            airdrop.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let mut report = RunReport::default();
        assert_eq!(report.summary(), "No airdrop was executed.");

        report.statuses.insert("Scroll".into(), true);
        report.statuses.insert("Base".into(), false);
        let summary = report.summary();
        assert!(summary.contains("successfully: Scroll"));
        assert!(summary.contains("errors (check the logs): Base"));

        report.stopped = true;
        assert_eq!(report.summary(), "Farming was stopped.");
    }

    #[test]
    fn test_platform_wait_overrides_window() {
        let delays = DelayPolicy {
            window: DelayConfig::new(5, 5),
            per_platform: PlatformWaits {
                twitter: Some(3000),
                ..Default::default()
            },
        };
        assert_eq!(delays.after(Some(Platform::Twitter)), Duration::from_secs(3000));
        assert_eq!(delays.after(Some(Platform::Defi)), Duration::from_secs(5));
        assert_eq!(delays.after(None), Duration::from_secs(5));
        assert!(DelayPolicy::none().after(Some(Platform::Discord)).is_zero());
    }
}
