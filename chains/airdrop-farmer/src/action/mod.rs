//! Declarative airdrop actions, as written in catalog files.
//!
//! ```json
//! { "platform": "defi", "isActivated": true, "blockchain": "goerli",
//!   "action": "transfer_native_token",
//!   "recipient_address": "<WALLET_ADDRESS>", "amount_in_wei": "1000000000000000" }
//! ```

pub mod amount;
pub mod dispatcher;
pub mod resolve;

use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::chain::{ApiRequest, CallArgs, PreparedTx};

pub use dispatcher::{ActionExecutor, Dispatcher};
pub use resolve::{ResolvedAction, WALLET_PLACEHOLDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Defi,
    Discord,
    Twitter,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Defi => "defi",
            Platform::Discord => "discord",
            Platform::Twitter => "twitter",
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_slippage() -> f64 {
    0.1
}

fn default_deadline_minutes() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSpec {
    #[serde(rename = "isActivated", alias = "is_activated", default = "default_true")]
    pub is_activated: bool,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ActionKind {
    Defi(DefiActionSpec),
    Discord(DiscordAction),
    Twitter(TwitterAction),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefiActionSpec {
    pub blockchain: String,
    #[serde(flatten)]
    pub action: DefiAction,
}

/// Addresses stay strings until dispatch so placeholders can be resolved.
/// `exchange_abi` falls back to the built-in Uniswap V2 router ABI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DefiAction {
    InteractWithContract {
        contract_address: String,
        abi: Value,
        function_name: String,
        #[serde(default)]
        function_args: CallArgs,
        #[serde(default, with = "amount::option")]
        msg_value: Option<U256>,
    },
    TransferNativeToken {
        recipient_address: String,
        #[serde(with = "amount")]
        amount_in_wei: U256,
    },
    TransferToken {
        token_address: String,
        recipient_address: String,
        #[serde(with = "amount")]
        amount: U256,
    },
    SwapTokens {
        token_in_address: String,
        token_out_address: String,
        #[serde(with = "amount")]
        amount_in: U256,
        exchange_address: String,
        #[serde(default)]
        exchange_abi: Option<Value>,
        #[serde(default = "default_slippage")]
        slippage: f64,
        #[serde(default = "default_deadline_minutes")]
        deadline_minutes: u64,
    },
    SwapNativeToken {
        token_out_address: String,
        #[serde(with = "amount")]
        amount_in: U256,
        exchange_address: String,
        #[serde(default)]
        exchange_abi: Option<Value>,
        #[serde(default = "default_slippage")]
        slippage: f64,
        #[serde(default = "default_deadline_minutes")]
        deadline_minutes: u64,
    },
    /// Either token may be `"native"`, which selects `addLiquidityETH`.
    AddLiquidity {
        token_a_address: String,
        token_b_address: String,
        #[serde(with = "amount")]
        amount_a: U256,
        #[serde(with = "amount")]
        amount_b: U256,
        exchange_address: String,
        #[serde(default)]
        exchange_abi: Option<Value>,
        #[serde(default = "default_slippage")]
        slippage: f64,
        #[serde(default = "default_deadline_minutes")]
        deadline_minutes: u64,
    },
    RemoveLiquidity {
        token_a_address: String,
        token_b_address: String,
        pair_address: String,
        #[serde(with = "amount")]
        liquidity: U256,
        #[serde(default, with = "amount::option")]
        amount_a_min: Option<U256>,
        #[serde(default, with = "amount::option")]
        amount_b_min: Option<U256>,
        exchange_address: String,
        #[serde(default)]
        exchange_abi: Option<Value>,
        #[serde(default = "default_deadline_minutes")]
        deadline_minutes: u64,
    },
    WrapNativeToken {
        #[serde(with = "amount")]
        amount: U256,
    },
    UnwrapNativeToken {
        #[serde(with = "amount")]
        amount: U256,
    },
    InteractWithApi {
        quote: ApiRequest,
        assemble_url: String,
        #[serde(default)]
        simulate: bool,
        /// Token spent by the assembled transaction, approved to its target
        #[serde(default)]
        approve_token: Option<String>,
        #[serde(default, with = "amount::option")]
        approve_amount: Option<U256>,
    },
}

impl DefiAction {
    pub fn name(&self) -> &'static str {
        match self {
            DefiAction::InteractWithContract { .. } => "interact_with_contract",
            DefiAction::TransferNativeToken { .. } => "transfer_native_token",
            DefiAction::TransferToken { .. } => "transfer_token",
            DefiAction::SwapTokens { .. } => "swap_tokens",
            DefiAction::SwapNativeToken { .. } => "swap_native_token",
            DefiAction::AddLiquidity { .. } => "add_liquidity",
            DefiAction::RemoveLiquidity { .. } => "remove_liquidity",
            DefiAction::WrapNativeToken { .. } => "wrap_native_token",
            DefiAction::UnwrapNativeToken { .. } => "unwrap_native_token",
            DefiAction::InteractWithApi { .. } => "interact_with_api",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DiscordAction {
    SendMessage {
        #[serde(with = "amount::id")]
        channel_id: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TwitterAction {
    Follow {
        user: String,
    },
    Retweet {
        #[serde(with = "amount::id")]
        tweet_id: String,
    },
    Tweet {
        text: String,
    },
}

impl ActionSpec {
    pub fn platform(&self) -> Platform {
        match self.kind {
            ActionKind::Defi(_) => Platform::Defi,
            ActionKind::Discord(_) => Platform::Discord,
            ActionKind::Twitter(_) => Platform::Twitter,
        }
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            ActionKind::Defi(defi) => defi.action.name(),
            ActionKind::Discord(DiscordAction::SendMessage { .. }) => "send_message",
            ActionKind::Twitter(TwitterAction::Follow { .. }) => "follow",
            ActionKind::Twitter(TwitterAction::Retweet { .. }) => "retweet",
            ActionKind::Twitter(TwitterAction::Tweet { .. }) => "tweet",
        }
    }

    /// "interact with contract", for log lines.
    pub fn label(&self) -> String {
        self.name().replace('_', " ")
    }

    pub fn blockchain(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Defi(defi) => Some(&defi.blockchain),
            _ => None,
        }
    }
}

/// What one dispatched action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Mined; a reverted transaction still carries its hash.
    Submitted {
        hash: H256,
        success: bool,
        explorer_link: String,
    },
    /// Watch-only wallet: the unsigned transactions, in order
    Prepared(Vec<PreparedTx>),
    /// Completion signal of an off-chain platform
    Completed(bool),
    /// The action failed before producing anything; the reason was logged.
    NoResult,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            ActionOutcome::Submitted { success, .. } => *success,
            ActionOutcome::Prepared(txs) => !txs.is_empty(),
            ActionOutcome::Completed(done) => *done,
            ActionOutcome::NoResult => false,
        }
    }

    pub fn hash(&self) -> Option<H256> {
        match self {
            ActionOutcome::Submitted { hash, .. } => Some(*hash),
            _ => None,
        }
    }
}
