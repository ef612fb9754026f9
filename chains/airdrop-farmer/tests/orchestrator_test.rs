mod common;

use airdrop_farmer::chain::ChainWallet;
use airdrop_farmer::{Catalog, DelayPolicy, ExecutionState, Orchestrator};
use common::*;
use core_logic::DelayConfig;
use ethers::types::Address;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn wallets(n: u8) -> Vec<ChainWallet> {
    (1..=n)
        .map(|i| ChainWallet::watch_only(Address::repeat_byte(i)))
        .collect()
}

fn build_orchestrator(
    airdrops: Vec<airdrop_farmer::AirdropDefinition>,
    wallets: Vec<ChainWallet>,
    executor: Arc<RecordingExecutor>,
) -> Orchestrator {
    Orchestrator::new(Arc::new(Catalog::from_definitions(airdrops)), wallets, executor)
        .with_delays(DelayPolicy::none())
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_airdrops_then_wallets_then_actions() {
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Scroll", true, vec![tweet("ok-1"), tweet("ok-2")]),
            airdrop("Base", true, vec![tweet("ok-3")]),
        ],
        wallets(2),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Base", "Scroll"]));
    let report = orchestrator.run(&state).await.unwrap();

    let w1 = Address::repeat_byte(1);
    let w2 = Address::repeat_byte(2);
    assert_eq!(
        executor.calls(),
        vec![
            ("ok-1".to_string(), w1),
            ("ok-2".to_string(), w1),
            ("ok-1".to_string(), w2),
            ("ok-2".to_string(), w2),
            ("ok-3".to_string(), w1),
            ("ok-3".to_string(), w2),
        ]
    );
    assert_eq!(report.statuses.get("Scroll"), Some(&true));
    assert_eq!(report.statuses.get("Base"), Some(&true));
    assert_eq!(report.stats.success, 6);
    assert!(!report.stopped);
    assert!(state.is_finished());
    assert_eq!(state.statuses().await, report.statuses);
}

#[tokio::test]
async fn test_deactivated_and_unselected_are_skipped() {
    let mut inactive_action = tweet("ok-skipped");
    inactive_action.is_activated = false;

    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Off", false, vec![tweet("ok-off")]),
            airdrop("Scroll", true, vec![inactive_action, tweet("ok-kept")]),
            airdrop("Unselected", true, vec![tweet("ok-other")]),
        ],
        wallets(1),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Off", "Scroll", "Unknown"]));
    let report = orchestrator.run(&state).await.unwrap();

    assert_eq!(executor.texts(), vec!["ok-kept".to_string()]);
    assert_eq!(report.statuses.len(), 1);
    assert_eq!(report.statuses.get("Scroll"), Some(&true));
    assert!(!report.statuses.contains_key("Off"));
}

#[tokio::test]
async fn test_status_is_conjunction_of_actions() {
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Mixed", true, vec![tweet("ok-1"), tweet("fail-1")]),
            airdrop("NoResult", true, vec![tweet("none-1")]),
            airdrop("Errored", true, vec![tweet("err-1")]),
            airdrop("Clean", true, vec![tweet("ok-2")]),
            airdrop("Empty", true, vec![]),
        ],
        wallets(1),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Mixed", "NoResult", "Errored", "Clean", "Empty"]));
    let report = orchestrator.run(&state).await.unwrap();

    assert_eq!(report.statuses.get("Mixed"), Some(&false));
    assert_eq!(report.statuses.get("NoResult"), Some(&false));
    assert_eq!(report.statuses.get("Errored"), Some(&false));
    assert_eq!(report.statuses.get("Clean"), Some(&true));
    assert_eq!(report.statuses.get("Empty"), Some(&false));
    // an error never aborts the run
    assert_eq!(executor.texts().last().map(String::as_str), Some("ok-2"));
    assert_eq!(report.stats.success, 2);
    assert_eq!(report.stats.failed, 3);
    assert_eq!(report.succeeded(), vec!["Clean"]);

    let summary = report.summary();
    assert!(summary.contains("Airdrops completed successfully: Clean"));
    assert!(summary.contains("Empty, Errored, Mixed, NoResult"));
}

#[tokio::test]
async fn test_stop_between_actions() {
    let executor = Arc::new(RecordingExecutor::stopping_after(2));
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Scroll", true, vec![tweet("ok-1"), tweet("ok-2"), tweet("ok-3")]),
            airdrop("Base", true, vec![tweet("ok-4")]),
        ],
        wallets(2),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Scroll", "Base"]));
    let report = orchestrator.run(&state).await.unwrap();

    assert_eq!(executor.texts(), names(&["ok-1", "ok-2"]));
    assert!(report.statuses.is_empty());
    assert!(report.stopped);
    assert_eq!(report.summary(), "Farming was stopped.");
    assert!(state.is_finished());
    assert!(state.stop_requested());
}

#[tokio::test]
async fn test_stop_between_airdrops_keeps_earlier_status() {
    let executor = Arc::new(RecordingExecutor::stopping_after(1));
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Scroll", true, vec![tweet("ok-1")]),
            airdrop("Base", true, vec![tweet("ok-2")]),
        ],
        wallets(1),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Scroll", "Base"]));
    let report = orchestrator.run(&state).await.unwrap();

    assert_eq!(executor.texts(), names(&["ok-1"]));
    assert_eq!(report.statuses.get("Scroll"), Some(&true));
    assert!(!report.statuses.contains_key("Base"));
    assert!(report.stopped);
}

#[tokio::test]
async fn test_stop_after_first_action_of_first_airdrop() {
    let executor = Arc::new(RecordingExecutor::stopping_after(1));
    let orchestrator = build_orchestrator(
        vec![
            airdrop("Scroll", true, vec![tweet("ok-1"), tweet("ok-2")]),
            airdrop("Base", true, vec![tweet("ok-3")]),
        ],
        wallets(1),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Scroll", "Base"]));
    let report = orchestrator.run(&state).await.unwrap();

    assert_eq!(executor.calls().len(), 1);
    assert!(report.statuses.is_empty());
    assert!(state.is_finished());
}

#[tokio::test]
async fn test_stop_interrupts_wait() {
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = Orchestrator::new(
        Arc::new(Catalog::from_definitions(vec![airdrop(
            "Scroll",
            true,
            vec![tweet("ok-1"), tweet("ok-2")],
        )])),
        wallets(1),
        executor.clone(),
    )
    .with_delays(DelayPolicy {
        window: DelayConfig::new(3600, 3600),
        ..Default::default()
    });

    let state = Arc::new(ExecutionState::new(names(&["Scroll"])));
    let stopper = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.request_stop();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&state))
        .await
        .expect("stop request should interrupt the wait")
        .unwrap();

    assert_eq!(executor.texts(), names(&["ok-1"]));
    assert!(report.stopped);
    assert!(report.statuses.is_empty());
}

#[tokio::test]
async fn test_second_run_on_same_state_is_refused() {
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![airdrop("Scroll", true, vec![tweet("ok-1")])],
        wallets(1),
        executor.clone(),
    );

    let state = ExecutionState::new(names(&["Scroll"]));
    orchestrator.run(&state).await.unwrap();
    assert!(orchestrator.run(&state).await.is_err());
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn test_discord_connects_once_when_catalog_needs_it() {
    let discord: airdrop_farmer::ActionSpec = serde_json::from_value(json!({
        "platform": "discord",
        "action": "send_message",
        "channel_id": "1105170830271193169",
        "message": "gm"
    }))
    .unwrap();

    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![airdrop("Scroll", true, vec![discord, tweet("ok-1")])],
        wallets(2),
        executor.clone(),
    );
    orchestrator
        .run(&ExecutionState::new(names(&["Scroll"])))
        .await
        .unwrap();
    assert_eq!(executor.discord_connects.load(Ordering::SeqCst), 1);

    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = build_orchestrator(
        vec![airdrop("Scroll", true, vec![tweet("ok-1")])],
        wallets(1),
        executor.clone(),
    );
    orchestrator
        .run(&ExecutionState::new(names(&["Scroll"])))
        .await
        .unwrap();
    assert_eq!(executor.discord_connects.load(Ordering::SeqCst), 0);
}
