#![allow(dead_code)]

use airdrop_farmer::action::{ActionKind, TwitterAction};
use airdrop_farmer::chain::{
    ChainClient, ChainError, ChainRegistry, ChainRpc, ChainSpec, ChainWallet, ClientSettings,
    RpcConnector,
};
use airdrop_farmer::config::{ChainSettings, ErrorPatternsToml};
use airdrop_farmer::platform::UnconfiguredAdapter;
use airdrop_farmer::{ActionExecutor, ActionOutcome, ActionSpec, AirdropDefinition, Dispatcher};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::WalletRecord;
use ethers::abi::{self, ParamType, Token};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::keccak256;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Anvil account #0
pub const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const WETH: &str = "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6";
pub const EXPLORER: &str = "https://goerli.etherscan.io/tx/";

pub const SEL_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
pub const SEL_ALLOWANCE: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
pub const SEL_APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
pub const SEL_GET_AMOUNTS_OUT: [u8; 4] = [0xd0, 0x6c, 0xa6, 0x1f];
pub const SEL_SWAP_EXACT: [u8; 4] = [0x38, 0xed, 0x17, 0x39];

pub fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::exp10(9)
}

/// Scripted node state. Counters at the bottom are filled by the mock.
#[derive(Debug, Clone)]
pub struct NodeState {
    /// `None` makes `eth_chainId` fail, as an unreachable node would
    pub chain_id: Option<u64>,
    pub gas_price: U256,
    /// `eth_gasPrice` answers 503 this many times before succeeding
    pub gas_price_failures: usize,
    pub balance: U256,
    pub token_balance: U256,
    pub allowance: U256,
    pub amounts_out: U256,
    pub confirmed_nonce: U256,
    pub pending_nonce: U256,
    pub estimate_error: Option<String>,
    pub send_error: Option<String>,
    /// `None` means the transaction is never mined
    pub receipt_status: Option<u64>,
    /// Whether `eth_getTransactionByHash` still finds a sent transaction
    pub tx_known: bool,
    pub txpool: Option<TxpoolContent>,

    pub estimates: Vec<Estimate>,
    pub send_attempts: usize,
    pub sent: usize,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            chain_id: Some(5),
            gas_price: gwei(1),
            gas_price_failures: 0,
            balance: U256::exp10(18),
            token_balance: U256::exp10(18),
            allowance: U256::zero(),
            amounts_out: U256::from(2_000),
            confirmed_nonce: U256::zero(),
            pending_nonce: U256::zero(),
            estimate_error: None,
            send_error: None,
            receipt_status: Some(1),
            tx_known: true,
            txpool: None,
            estimates: Vec::new(),
            send_attempts: 0,
            sent: 0,
        }
    }
}

/// What the client asked the node to estimate.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl Estimate {
    pub fn selector(&self) -> [u8; 4] {
        let mut selector = [0u8; 4];
        if self.data.len() >= 4 {
            selector.copy_from_slice(&self.data[..4]);
        }
        selector
    }

    pub fn args(&self, types: &[ParamType]) -> Vec<Token> {
        abi::decode(types, &self.data[4..]).unwrap()
    }
}

pub struct MockNode {
    state: Mutex<NodeState>,
}

impl MockNode {
    pub fn new(state: NodeState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> NodeState {
        self.state.lock().unwrap().clone()
    }

    pub fn estimates(&self) -> Vec<Estimate> {
        self.state().estimates
    }

    pub fn sent(&self) -> usize {
        self.state().sent
    }

    pub fn send_attempts(&self) -> usize {
        self.state().send_attempts
    }

    fn rpc_error(method: &'static str, message: &str) -> ChainError {
        ChainError::Rpc {
            method,
            message: message.to_string(),
        }
    }
}

fn uint(value: U256) -> Bytes {
    abi::encode(&[Token::Uint(value)]).into()
}

#[async_trait]
impl ChainRpc for MockNode {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.state
            .lock()
            .unwrap()
            .chain_id
            .ok_or_else(|| Self::rpc_error("eth_chainId", "connection refused"))
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.gas_price_failures > 0 {
            state.gas_price_failures -= 1;
            return Err(Self::rpc_error("eth_gasPrice", "503 Service Unavailable"));
        }
        Ok(state.gas_price)
    }

    async fn balance(&self, _address: Address) -> Result<U256, ChainError> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn transaction_count(
        &self,
        _address: Address,
        pending: bool,
    ) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(if pending {
            state.pending_nonce + U256::from(state.sent)
        } else {
            state.confirmed_nonce
        })
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.estimates.push(Estimate {
            from: tx.from().copied(),
            to: match tx.to() {
                Some(NameOrAddress::Address(addr)) => Some(*addr),
                _ => None,
            },
            value: tx.value().copied().unwrap_or_default(),
            data: tx.data().cloned().unwrap_or_default(),
        });
        match &state.estimate_error {
            Some(message) => Err(Self::rpc_error("eth_estimateGas", message)),
            None => Ok(U256::from(60_000)),
        }
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ChainError> {
        let state = self.state.lock().unwrap();
        let data = tx.data().cloned().unwrap_or_default();
        if data.len() < 4 {
            return Err(Self::rpc_error("eth_call", "execution reverted"));
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];
        match selector {
            SEL_BALANCE_OF => Ok(uint(state.token_balance)),
            SEL_ALLOWANCE => Ok(uint(state.allowance)),
            SEL_GET_AMOUNTS_OUT => {
                let amount_in = abi::decode(
                    &[
                        ParamType::Uint(256),
                        ParamType::Array(Box::new(ParamType::Address)),
                    ],
                    &data[4..],
                )
                .ok()
                .and_then(|t| t[0].clone().into_uint())
                .unwrap_or_default();
                Ok(abi::encode(&[Token::Array(vec![
                    Token::Uint(amount_in),
                    Token::Uint(state.amounts_out),
                ])])
                .into())
            }
            _ => Err(Self::rpc_error("eth_call", "execution reverted")),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.send_attempts += 1;
        if let Some(message) = &state.send_error {
            return Err(Self::rpc_error("eth_sendRawTransaction", message));
        }
        state.sent += 1;

        // An approval takes effect as soon as it is sent.
        if let Some(last) = state.estimates.last().cloned() {
            if last.selector() == SEL_APPROVE {
                let args = last.args(&[ParamType::Address, ParamType::Uint(256)]);
                if let Some(amount) = args[1].clone().into_uint() {
                    state.allowance = amount;
                }
            }
        }
        Ok(H256::from(keccak256(&raw)))
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state.receipt_status.map(|status| TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::from(status)),
            ..Default::default()
        }))
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        let state = self.state.lock().unwrap();
        if !state.tx_known {
            return Ok(None);
        }
        Ok(Some(Transaction {
            hash,
            nonce: state.confirmed_nonce,
            gas_price: Some(state.gas_price),
            ..Default::default()
        }))
    }

    async fn txpool_content(&self) -> Result<TxpoolContent, ChainError> {
        self.state
            .lock()
            .unwrap()
            .txpool
            .clone()
            .ok_or_else(|| {
                Self::rpc_error("txpool_content", "the method txpool_content does not exist")
            })
    }
}

pub struct MockConnector {
    pub node: Arc<MockNode>,
}

impl RpcConnector for MockConnector {
    fn connect(&self, _spec: &ChainSpec) -> Result<Arc<dyn ChainRpc>, ChainError> {
        Ok(self.node.clone() as Arc<dyn ChainRpc>)
    }
}

pub fn chain_settings(gas_oracle_url: Option<String>) -> ChainSettings {
    ChainSettings {
        rpc_url: "http://localhost:8545".to_string(),
        explorer_url: EXPLORER.to_string(),
        wrapped_native: WETH.to_string(),
        gas_oracle_url,
        erc20_abi_path: None,
        weth_abi_path: None,
        error_patterns: ErrorPatternsToml::default(),
    }
}

pub fn chain_spec(gas_oracle_url: Option<String>) -> Arc<ChainSpec> {
    Arc::new(ChainSpec::from_settings("goerli", &chain_settings(gas_oracle_url)).unwrap())
}

pub fn registry() -> Arc<ChainRegistry> {
    let mut registry = ChainRegistry::default();
    registry.insert(ChainSpec::from_settings("goerli", &chain_settings(None)).unwrap());
    Arc::new(registry)
}

pub fn settings() -> ClientSettings {
    ClientSettings {
        tx_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        http_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

pub fn signer_wallet() -> ChainWallet {
    ChainWallet::from_record(&WalletRecord::new("", Some(KEY.to_string()))).unwrap()
}

pub fn watch_wallet() -> ChainWallet {
    ChainWallet::watch_only(ADDRESS.parse().unwrap())
}

pub async fn client(node: Arc<MockNode>) -> ChainClient {
    client_with(node, chain_spec(None), settings(), CancellationToken::new()).await
}

pub async fn client_with(
    node: Arc<MockNode>,
    spec: Arc<ChainSpec>,
    settings: ClientSettings,
    cancel: CancellationToken,
) -> ChainClient {
    ChainClient::with_rpc(spec, node, settings, reqwest::Client::new(), cancel).await
}

pub fn dispatcher(node: Arc<MockNode>) -> Dispatcher {
    Dispatcher::new(
        registry(),
        Arc::new(MockConnector { node }),
        settings(),
        reqwest::Client::new(),
        Arc::new(UnconfiguredAdapter::discord()),
        Arc::new(UnconfiguredAdapter::twitter()),
    )
}

/// A goerli `defi` action from its action-specific fields.
pub fn defi(fields: Value) -> ActionSpec {
    let mut value = json!({"platform": "defi", "blockchain": "goerli"});
    if let (Some(base), Value::Object(extra)) = (value.as_object_mut(), fields) {
        base.extend(extra);
    }
    serde_json::from_value(value).unwrap()
}

pub fn tweet(text: &str) -> ActionSpec {
    serde_json::from_value(json!({"platform": "twitter", "action": "tweet", "text": text}))
        .unwrap()
}

pub fn airdrop(name: &str, is_activated: bool, actions: Vec<ActionSpec>) -> AirdropDefinition {
    AirdropDefinition {
        name: name.to_string(),
        is_activated,
        actions,
    }
}

/// Executor driven by tweet texts: `ok*` completes, `fail*` does not,
/// `none*` yields no result and `err*` returns an error.
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<(String, Address)>>,
    pub discord_connects: AtomicUsize,
    /// Cancels the run's token once this many actions were executed
    pub stop_after: Option<usize>,
}

impl RecordingExecutor {
    pub fn stopping_after(calls: usize) -> Self {
        Self {
            stop_after: Some(calls),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Address)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls().into_iter().map(|(text, _)| text).collect()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(
        &self,
        action: &ActionSpec,
        wallet: &ChainWallet,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome> {
        let text = match &action.kind {
            ActionKind::Twitter(TwitterAction::Tweet { text }) => text.clone(),
            _ => action.name().to_string(),
        };
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((text.clone(), wallet.address));
            calls.len()
        };
        if self.stop_after == Some(count) {
            cancel.cancel();
        }

        if text.starts_with("ok") {
            Ok(ActionOutcome::Completed(true))
        } else if text.starts_with("fail") {
            Ok(ActionOutcome::Completed(false))
        } else if text.starts_with("err") {
            anyhow::bail!("scripted failure for {}", text)
        } else {
            Ok(ActionOutcome::NoResult)
        }
    }

    async fn connect_discord(&self) -> Result<()> {
        self.discord_connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
