//! JSON-RPC seam between the chain client and a node.
//!
//! The client only talks to `dyn ChainRpc`, so production code goes through
//! an ethers `Provider<Http>` while tests can script the node.

use async_trait::async_trait;
use core_logic::ConfigError;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;

use super::error::ChainError;
use super::registry::ChainSpec;

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn gas_price(&self) -> Result<U256, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// `pending == true` includes the wallet's unconfirmed transactions.
    async fn transaction_count(&self, address: Address, pending: bool)
        -> Result<U256, ChainError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ChainError>;

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ChainError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError>;

    async fn transaction_receipt(&self, hash: H256)
        -> Result<Option<TransactionReceipt>, ChainError>;

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError>;

    /// Non-standard; many nodes do not expose it.
    async fn txpool_content(&self) -> Result<TxpoolContent, ChainError>;
}

/// Opens an RPC handle for a registry entry.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, spec: &ChainSpec) -> Result<Arc<dyn ChainRpc>, ChainError>;
}

pub struct EthersRpc {
    provider: Provider<Http>,
}

impl EthersRpc {
    pub fn new(rpc_url: &str, client: reqwest::Client) -> Result<Self, ChainError> {
        let url = reqwest::Url::parse(rpc_url).map_err(|_| ConfigError::InvalidRpcUrl {
            url: rpc_url.to_string(),
        })?;
        let provider = Provider::new(Http::new_with_client(url, client));
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| ChainError::rpc("eth_chainId", e))?;
        Ok(id.as_u64())
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::rpc("eth_gasPrice", e))
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| ChainError::rpc("eth_getBalance", e))
    }

    async fn transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<U256, ChainError> {
        let block = if pending {
            Some(BlockNumber::Pending.into())
        } else {
            None
        };
        self.provider
            .get_transaction_count(address, block)
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionCount", e))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ChainError> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| ChainError::rpc("eth_estimateGas", e))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ChainError> {
        self.provider
            .call(tx, None)
            .await
            .map_err(|e| ChainError::rpc("eth_call", e))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| ChainError::rpc("eth_sendRawTransaction", e))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionReceipt", e))
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        self.provider
            .get_transaction(hash)
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionByHash", e))
    }

    async fn txpool_content(&self) -> Result<TxpoolContent, ChainError> {
        self.provider
            .txpool_content()
            .await
            .map_err(|e| ChainError::rpc("txpool_content", e))
    }
}

/// Connects over HTTP with a shared reqwest client.
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, spec: &ChainSpec) -> Result<Arc<dyn ChainRpc>, ChainError> {
        Ok(Arc::new(EthersRpc::new(&spec.rpc_url, self.client.clone())?))
    }
}
