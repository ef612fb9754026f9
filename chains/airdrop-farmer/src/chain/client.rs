use core_logic::{is_transient_message, with_retry, GasConfig, RetryConfig};
use ethers::abi::{Function, Token};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::format_units;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::abi::{decode_output, encode_call};
use super::error::{ChainError, SubmitErrorKind};
use super::gas::fetch_safe_gas_price;
use super::registry::{ChainRegistry, ChainSpec};
use super::rpc::{ChainRpc, RpcConnector};
use super::tx::{PreparedTx, TxCall, TxOutcome};
use super::wallet::ChainWallet;
use crate::config::FarmerConfig;

/// Timing and gas knobs shared by every client of a run.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub tx_timeout: Duration,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub gas: GasConfig,
    /// Backoff for idempotent reads; submissions are never retried
    pub read_retry: RetryConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            tx_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
            http_timeout: Duration::from_secs(10),
            gas: GasConfig::default(),
            read_retry: RetryConfig::default(),
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &FarmerConfig) -> Self {
        Self {
            tx_timeout: config.transaction_timeout(),
            poll_interval: config.receipt_poll_interval(),
            http_timeout: config.http_timeout(),
            gas: config.gas_config(),
            read_retry: RetryConfig::default(),
        }
    }
}

/// Talks to one network on behalf of any number of wallets.
///
/// Built per action and dropped afterwards; it holds no state across runs.
pub struct ChainClient {
    pub(super) spec: Arc<ChainSpec>,
    pub(super) rpc: Arc<dyn ChainRpc>,
    pub(super) settings: ClientSettings,
    pub(super) http: reqwest::Client,
    pub(super) cancel: CancellationToken,
    chain_id: Option<u64>,
}

pub(super) fn to_u128(value: U256) -> u128 {
    if value.bits() > 128 {
        u128::MAX
    } else {
        value.low_u128()
    }
}

pub(super) fn gwei(value: U256) -> String {
    format_units(value, "gwei").unwrap_or_else(|_| value.to_string())
}

/// Fails a multi-step protocol when an intermediate step reverted.
pub(super) fn check_step(step: &'static str, outcome: &TxOutcome) -> Result<(), ChainError> {
    match outcome {
        TxOutcome::Mined {
            hash,
            success: false,
        } => Err(ChainError::StepReverted { step, hash: *hash }),
        _ => Ok(()),
    }
}

impl ChainClient {
    /// Resolves `blockchain` in the registry and verifies connectivity.
    ///
    /// An unknown chain is a configuration error. A node that does not
    /// answer leaves the client disconnected, which callers check with
    /// [`ChainClient::is_connected`].
    pub async fn connect(
        registry: &ChainRegistry,
        blockchain: &str,
        connector: &dyn RpcConnector,
        settings: ClientSettings,
        http: reqwest::Client,
        cancel: CancellationToken,
    ) -> Result<Self, ChainError> {
        let spec = registry.get(blockchain)?;
        let rpc = connector.connect(&spec)?;
        Ok(Self::with_rpc(spec, rpc, settings, http, cancel).await)
    }

    pub async fn with_rpc(
        spec: Arc<ChainSpec>,
        rpc: Arc<dyn ChainRpc>,
        settings: ClientSettings,
        http: reqwest::Client,
        cancel: CancellationToken,
    ) -> Self {
        let chain_id = match rpc.chain_id().await {
            Ok(id) => {
                info!("Successfully connected to {} blockchain.", spec.id);
                Some(id)
            }
            Err(e) => {
                error!("Could not connect to {} blockchain: {}", spec.id, e);
                None
            }
        };

        Self {
            spec,
            rpc,
            settings,
            http,
            cancel,
            chain_id,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.chain_id.is_some()
    }

    pub fn blockchain(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn explorer_link(&self, hash: &H256) -> String {
        self.spec.explorer_link(hash)
    }

    fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id.ok_or_else(|| ChainError::NotConnected {
            chain: self.spec.id.clone(),
        })
    }

    /// Oracle "safe" price when the chain has an oracle, node price otherwise
    /// or when the oracle fails. Not boosted.
    pub async fn recommended_gas_price(&self) -> Result<U256, ChainError> {
        if let Some(url) = &self.spec.gas_oracle_url {
            match fetch_safe_gas_price(&self.http, url, self.settings.http_timeout).await {
                Ok(price) => return Ok(price),
                Err(e) => warn!("Error fetching gas price : {}. Using node gas price.", e),
            }
        }
        with_retry(&self.settings.read_retry, "eth_gasPrice", || self.rpc.gas_price()).await
    }

    /// Recommended price with the build multiplier applied.
    pub async fn transaction_gas_price(&self) -> Result<U256, ChainError> {
        let recommended = self.recommended_gas_price().await?;
        let boosted = U256::from(self.settings.gas.boosted_price(to_u128(recommended)));
        debug!(
            "Recommended gas price : {} Gwei, using {} Gwei",
            gwei(recommended),
            gwei(boosted)
        );
        Ok(boosted)
    }

    /// Estimates with the real `from`/`value`; known revert-style failures
    /// fall back to the configured default limit.
    pub async fn estimate_gas_limit(&self, tx: &TypedTransaction) -> Result<U256, ChainError> {
        match self.rpc.estimate_gas(tx).await {
            Ok(gas) => Ok(gas),
            Err(e) => {
                let message = e.node_message().map(str::to_string).unwrap_or_else(|| e.to_string());
                if self.spec.error_patterns.allows_gas_fallback(&message) {
                    warn!(
                        "{}. Using default gas limit but transaction may fail.",
                        message
                    );
                    Ok(U256::from(self.settings.gas.limit_fallback()))
                } else {
                    error!("Error estimating gas limit : {}", message);
                    Err(ChainError::GasEstimate(message))
                }
            }
        }
    }

    /// Fills gas, gas price, nonce and chain id for a legacy transaction.
    pub async fn build_transaction(
        &self,
        wallet: &ChainWallet,
        call: &TxCall,
    ) -> Result<TransactionRequest, ChainError> {
        let chain_id = self.chain_id()?;
        let tx = TransactionRequest::new()
            .from(wallet.address)
            .to(call.to)
            .value(call.value)
            .data(call.data.clone())
            .chain_id(chain_id);

        let gas = match call.gas {
            Some(gas) => gas,
            None => self.estimate_gas_limit(&tx.clone().into()).await?,
        };
        let gas_price = match call.gas_price {
            Some(price) => price,
            None => self.transaction_gas_price().await?,
        };
        let nonce = match call.nonce {
            Some(nonce) => nonce,
            None => self.transaction_count(wallet.address, true).await?,
        };

        Ok(tx.gas(gas).gas_price(gas_price).nonce(nonce))
    }

    /// Build, sign, submit and confirm.
    pub async fn send(&self, wallet: &ChainWallet, call: TxCall) -> Result<TxOutcome, ChainError> {
        let tx = self.build_transaction(wallet, &call).await?;
        self.finalize(wallet, tx).await
    }

    /// Signs and submits a built transaction, or returns it unsigned for a
    /// watch-only wallet.
    pub async fn finalize(
        &self,
        wallet: &ChainWallet,
        tx: TransactionRequest,
    ) -> Result<TxOutcome, ChainError> {
        let signer = match wallet.signer() {
            Some(signer) => signer,
            None => {
                debug!("No private key for {}, returning the unsigned transaction", wallet.checksum());
                return Ok(TxOutcome::Prepared(vec![PreparedTx::from_request(
                    &self.spec.id,
                    &tx,
                )]));
            }
        };

        let typed: TypedTransaction = tx.into();
        let signature = signer
            .sign_transaction_sync(&typed)
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);

        let hash = self.submit(raw).await?;
        self.confirm(hash).await
    }

    async fn submit(&self, raw: Bytes) -> Result<H256, ChainError> {
        match self.rpc.send_raw_transaction(raw).await {
            Ok(hash) => {
                info!("Transaction sent : {}", self.explorer_link(&hash));
                Ok(hash)
            }
            Err(e) => {
                let message = e.node_message().map(str::to_string).unwrap_or_else(|| e.to_string());
                let kind = self.spec.error_patterns.classify_submit(&message);
                match kind {
                    SubmitErrorKind::InsufficientFunds => error!(
                        "Insufficient funds for gas * price + value. Check your account balance."
                    ),
                    SubmitErrorKind::Underpriced => error!(
                        "Transaction underpriced, a pending transaction holds this nonce: {}",
                        message
                    ),
                    SubmitErrorKind::NonceTooLow => error!("Nonce already used: {}", message),
                    SubmitErrorKind::AlreadyKnown => {
                        warn!("Node already knows this transaction: {}", message)
                    }
                    SubmitErrorKind::Unclassified => error!(
                        "Unexpected error occurred while sending transaction: {}",
                        message
                    ),
                }
                Err(ChainError::Submit { kind, message })
            }
        }
    }

    async fn confirm(&self, hash: H256) -> Result<TxOutcome, ChainError> {
        let receipt = self.wait_for_receipt(hash).await?;
        let success = receipt.status == Some(U64::from(1));
        if success {
            info!("Transaction succeeded : {}", self.explorer_link(&hash));
        } else {
            warn!("Transaction failed (reverted) : {}", self.explorer_link(&hash));
        }
        Ok(TxOutcome::Mined { hash, success })
    }

    /// Polls for a receipt every `poll_interval` until `tx_timeout`.
    ///
    /// On timeout the transaction is looked up once more to tell a slow
    /// transaction (`TimedOut`) from a dropped one (`NotFound`).
    pub async fn wait_for_receipt(&self, hash: H256) -> Result<TransactionReceipt, ChainError> {
        let deadline = Instant::now() + self.settings.tx_timeout;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ChainError::Cancelled);
            }

            match self.rpc.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => {
                    let message = e.to_string();
                    if is_transient_message(&message) {
                        debug!("Receipt poll failed, retrying: {}", message);
                    } else {
                        error!(
                            "Unexpected error occurred while waiting for transaction to be mined: {}",
                            message
                        );
                        return Err(e);
                    }
                }
            }

            if Instant::now() >= deadline {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ChainError::Cancelled),
                _ = sleep(self.settings.poll_interval) => {}
            }
        }

        match self.rpc.transaction(hash).await {
            Ok(Some(_)) => {
                error!(
                    "Transaction has not been mined after the timeout. You may want to check the transaction manually : {}",
                    self.explorer_link(&hash)
                );
                Err(ChainError::TimedOut {
                    hash,
                    timeout_secs: self.settings.tx_timeout.as_secs(),
                })
            }
            Ok(None) => {
                error!("Transaction not found: {:?}", hash);
                Err(ChainError::NotFound { hash })
            }
            Err(e) => {
                error!("Transaction {:?} status unknown after the timeout: {}", hash, e);
                Err(ChainError::TimedOut {
                    hash,
                    timeout_secs: self.settings.tx_timeout.as_secs(),
                })
            }
        }
    }

    /// Confirmed (`pending = false`) or pending-inclusive transaction count.
    pub async fn transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<U256, ChainError> {
        with_retry(&self.settings.read_retry, "eth_getTransactionCount", || {
            self.rpc.transaction_count(address, pending)
        })
        .await
    }

    /// `eth_call` of a view function.
    pub async fn read(
        &self,
        to: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError> {
        let data = encode_call(function, args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let output =
            with_retry(&self.settings.read_retry, "eth_call", || self.rpc.call(&tx)).await?;
        decode_output(function, &output)
    }
}
