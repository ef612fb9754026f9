use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::PlatformAdapter;
use ethers::abi::Abi;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    ActionKind, ActionOutcome, ActionSpec, DefiAction, DefiActionSpec, DiscordAction,
    ResolvedAction, TwitterAction,
};
use crate::chain::abi::parse_abi;
use crate::chain::{
    AddLiquidityParams, ApiApproval, ChainClient, ChainError, ChainRegistry, ChainWallet,
    ClientSettings, RemoveLiquidityParams, RpcConnector, SwapParams, TokenRef, TxOutcome,
};

/// Runs one catalog action for one wallet.
///
/// `Err` is reserved for errors the run should hear about (configuration);
/// ordinary failures come back as [`ActionOutcome::NoResult`].
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        action: &ActionSpec,
        wallet: &ChainWallet,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome>;

    /// Called once per run when the catalog has Discord actions.
    async fn connect_discord(&self) -> Result<()> {
        Ok(())
    }
}

/// Production executor: chain clients for `defi`, adapters for the rest.
pub struct Dispatcher {
    registry: Arc<ChainRegistry>,
    connector: Arc<dyn RpcConnector>,
    settings: ClientSettings,
    http: reqwest::Client,
    discord: Arc<dyn PlatformAdapter<DiscordAction>>,
    twitter: Arc<dyn PlatformAdapter<TwitterAction>>,
}

fn address(field: &str, raw: &str) -> Result<Address, ChainError> {
    raw.trim()
        .trim_matches('"')
        .parse()
        .map_err(|_| ChainError::InvalidArgument {
            field: field.to_string(),
            reason: format!("'{}' is not an address", raw),
        })
}

fn token_ref(field: &str, raw: &str) -> Result<TokenRef, ChainError> {
    raw.parse().map_err(|reason| ChainError::InvalidArgument {
        field: field.to_string(),
        reason,
    })
}

fn custom_abi(abi: &Option<serde_json::Value>) -> Result<Option<Abi>, ChainError> {
    abi.as_ref().map(parse_abi).transpose()
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ChainRegistry>,
        connector: Arc<dyn RpcConnector>,
        settings: ClientSettings,
        http: reqwest::Client,
        discord: Arc<dyn PlatformAdapter<DiscordAction>>,
        twitter: Arc<dyn PlatformAdapter<TwitterAction>>,
    ) -> Self {
        Self {
            registry,
            connector,
            settings,
            http,
            discord,
            twitter,
        }
    }

    async fn execute_defi(
        &self,
        spec: &DefiActionSpec,
        wallet: &ChainWallet,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome> {
        let client = match ChainClient::connect(
            &self.registry,
            &spec.blockchain,
            self.connector.as_ref(),
            self.settings.clone(),
            self.http.clone(),
            cancel.clone(),
        )
        .await
        {
            Ok(client) => client,
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("Cannot execute {}", spec.action.name()))
            }
            Err(e) => {
                error!("Could not create {} client: {}", spec.blockchain, e);
                return Ok(ActionOutcome::NoResult);
            }
        };
        if !client.is_connected() {
            error!(
                "Skipping {}, {} is not reachable",
                spec.action.name(),
                spec.blockchain
            );
            return Ok(ActionOutcome::NoResult);
        }

        match run_defi(&client, wallet, &spec.action).await {
            Ok(TxOutcome::Mined { hash, success }) => Ok(ActionOutcome::Submitted {
                hash,
                success,
                explorer_link: client.explorer_link(&hash),
            }),
            Ok(TxOutcome::Prepared(txs)) => Ok(ActionOutcome::Prepared(txs)),
            Err(e) if e.is_fatal() => {
                Err(e).with_context(|| format!("Cannot execute {}", spec.action.name()))
            }
            Err(ChainError::Cancelled) => {
                info!("{} interrupted by a stop request", spec.action.name());
                Ok(ActionOutcome::NoResult)
            }
            Err(e) => {
                error!("{} on {} failed: {}", spec.action.name(), spec.blockchain, e);
                Ok(ActionOutcome::NoResult)
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for Dispatcher {
    async fn execute(
        &self,
        action: &ActionSpec,
        wallet: &ChainWallet,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome> {
        let resolved = ResolvedAction::resolve(action, wallet)?;

        match &resolved.action.kind {
            ActionKind::Defi(spec) => self.execute_defi(spec, &resolved.wallet, cancel).await,
            ActionKind::Discord(discord) => {
                let done = self
                    .discord
                    .perform_action(discord)
                    .await
                    .context("Discord action failed")?;
                Ok(ActionOutcome::Completed(done))
            }
            ActionKind::Twitter(twitter) => {
                let done = self
                    .twitter
                    .perform_action(twitter)
                    .await
                    .context("Twitter action failed")?;
                Ok(ActionOutcome::Completed(done))
            }
        }
    }

    async fn connect_discord(&self) -> Result<()> {
        self.discord.connect().await
    }
}

/// One `DefiAction` onto the matching client operation.
async fn run_defi(
    client: &ChainClient,
    wallet: &ChainWallet,
    action: &DefiAction,
) -> Result<TxOutcome, ChainError> {
    match action {
        DefiAction::InteractWithContract {
            contract_address,
            abi,
            function_name,
            function_args,
            msg_value,
        } => {
            let contract = address("contract_address", contract_address)?;
            let abi = parse_abi(abi)?;
            client
                .interact_with_contract(
                    wallet,
                    contract,
                    &abi,
                    function_name,
                    function_args,
                    msg_value.unwrap_or_default(),
                )
                .await
        }
        DefiAction::TransferNativeToken {
            recipient_address,
            amount_in_wei,
        } => {
            let recipient = address("recipient_address", recipient_address)?;
            client
                .transfer_native_token(wallet, recipient, *amount_in_wei)
                .await
        }
        DefiAction::TransferToken {
            token_address,
            recipient_address,
            amount,
        } => {
            let token = address("token_address", token_address)?;
            let recipient = address("recipient_address", recipient_address)?;
            client
                .transfer_token(wallet, token, recipient, *amount)
                .await
        }
        DefiAction::SwapTokens {
            token_in_address,
            token_out_address,
            amount_in,
            exchange_address,
            exchange_abi,
            slippage,
            deadline_minutes,
        } => {
            let custom = custom_abi(exchange_abi)?;
            let params = SwapParams {
                token_in: address("token_in_address", token_in_address)?,
                token_out: address("token_out_address", token_out_address)?,
                amount_in: *amount_in,
                router: address("exchange_address", exchange_address)?,
                router_abi: custom.as_ref().unwrap_or(&client.spec().router_abi),
                slippage: *slippage,
                deadline_minutes: *deadline_minutes,
            };
            client.swap_tokens(wallet, &params).await
        }
        DefiAction::SwapNativeToken {
            token_out_address,
            amount_in,
            exchange_address,
            exchange_abi,
            slippage,
            deadline_minutes,
        } => {
            let custom = custom_abi(exchange_abi)?;
            let params = SwapParams {
                token_in: client.spec().wrapped_native,
                token_out: address("token_out_address", token_out_address)?,
                amount_in: *amount_in,
                router: address("exchange_address", exchange_address)?,
                router_abi: custom.as_ref().unwrap_or(&client.spec().router_abi),
                slippage: *slippage,
                deadline_minutes: *deadline_minutes,
            };
            client.swap_native_token(wallet, &params).await
        }
        DefiAction::AddLiquidity {
            token_a_address,
            token_b_address,
            amount_a,
            amount_b,
            exchange_address,
            exchange_abi,
            slippage,
            deadline_minutes,
        } => {
            let custom = custom_abi(exchange_abi)?;
            let params = AddLiquidityParams {
                token_a: token_ref("token_a_address", token_a_address)?,
                token_b: token_ref("token_b_address", token_b_address)?,
                amount_a: *amount_a,
                amount_b: *amount_b,
                router: address("exchange_address", exchange_address)?,
                router_abi: custom.as_ref().unwrap_or(&client.spec().router_abi),
                slippage: *slippage,
                deadline_minutes: *deadline_minutes,
            };
            client.add_liquidity(wallet, &params).await
        }
        DefiAction::RemoveLiquidity {
            token_a_address,
            token_b_address,
            pair_address,
            liquidity,
            amount_a_min,
            amount_b_min,
            exchange_address,
            exchange_abi,
            deadline_minutes,
        } => {
            let custom = custom_abi(exchange_abi)?;
            let params = RemoveLiquidityParams {
                token_a: token_ref("token_a_address", token_a_address)?,
                token_b: token_ref("token_b_address", token_b_address)?,
                pair: address("pair_address", pair_address)?,
                liquidity: *liquidity,
                amount_a_min: amount_a_min.unwrap_or_default(),
                amount_b_min: amount_b_min.unwrap_or_default(),
                router: address("exchange_address", exchange_address)?,
                router_abi: custom.as_ref().unwrap_or(&client.spec().router_abi),
                deadline_minutes: *deadline_minutes,
            };
            client.remove_liquidity(wallet, &params).await
        }
        DefiAction::WrapNativeToken { amount } => client.wrap_native_token(wallet, *amount).await,
        DefiAction::UnwrapNativeToken { amount } => {
            client.unwrap_native_token(wallet, *amount).await
        }
        DefiAction::InteractWithApi {
            quote,
            assemble_url,
            simulate,
            approve_token,
            approve_amount,
        } => {
            let approval = match (approve_token, approve_amount) {
                (Some(token), Some(amount)) => Some(ApiApproval {
                    token: address("approve_token", token)?,
                    amount: *amount,
                }),
                (Some(token), None) => {
                    warn!(
                        "approve_token {} given without approve_amount, approving the maximum",
                        token
                    );
                    Some(ApiApproval {
                        token: address("approve_token", token)?,
                        amount: U256::MAX,
                    })
                }
                _ => None,
            };
            client
                .interact_with_api(wallet, quote, assemble_url, *simulate, approval)
                .await
        }
    }
}
