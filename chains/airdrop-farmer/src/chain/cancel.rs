//! Replacing stuck transactions with zero-value self-transfers.

use ethers::types::{Address, H256, U256};
use tracing::{debug, info, warn};

use super::client::{gwei, to_u128, ChainClient};
use super::error::ChainError;
use super::tx::{TxCall, TxOutcome};
use super::wallet::ChainWallet;

/// Nodes require a replacement to outbid the original by at least 10%.
pub fn replacement_price(original: U256) -> U256 {
    original.saturating_add(original / 10)
}

impl ChainClient {
    fn self_transfer(&self, wallet: &ChainWallet, nonce: U256, gas_price: U256) -> TxCall {
        TxCall::transfer(wallet.address, U256::zero())
            .gas(U256::from(self.settings.gas.limit_transfer()))
            .gas_price(gas_price)
            .nonce(nonce)
    }

    /// Replaces the pending transaction `hash` at its nonce, +10% gas price.
    pub async fn cancel_transaction(
        &self,
        wallet: &ChainWallet,
        hash: H256,
    ) -> Result<TxOutcome, ChainError> {
        let original = self
            .rpc
            .transaction(hash)
            .await?
            .ok_or(ChainError::NotFound { hash })?;
        let price = replacement_price(original.gas_price.unwrap_or_default());

        info!(
            "Cancelling {} (nonce {}) with a self-transfer at {} Gwei",
            self.explorer_link(&hash),
            original.nonce,
            gwei(price)
        );
        self.send(wallet, self.self_transfer(wallet, original.nonce, price))
            .await
    }

    /// Unsticks the wallet's lowest pending nonce.
    ///
    /// The stuck nonce is the confirmed transaction count; there is nothing to
    /// do when the pending count equals it. The replacement pays the
    /// recommended price times the cancel multiplier, and at least 10% more
    /// than the stuck transaction when the node exposes `txpool_content`.
    pub async fn cancel_pending(&self, wallet: &ChainWallet) -> Result<TxOutcome, ChainError> {
        let confirmed = self.transaction_count(wallet.address, false).await?;
        let pending = self.transaction_count(wallet.address, true).await?;
        if pending <= confirmed {
            info!("No pending transaction for {}", wallet.checksum());
            return Err(ChainError::NothingPending {
                address: wallet.address,
            });
        }

        let recommended = self.recommended_gas_price().await?;
        let mut price = U256::from(self.settings.gas.cancel_price(to_u128(recommended)));
        if let Some(stuck) = self.stuck_gas_price(wallet.address, confirmed).await {
            price = price.max(replacement_price(stuck));
        }

        warn!(
            "{} pending transaction(s) for {}, replacing nonce {} at {} Gwei",
            pending - confirmed,
            wallet.checksum(),
            confirmed,
            gwei(price)
        );
        self.send(wallet, self.self_transfer(wallet, confirmed, price))
            .await
    }

    /// Gas price of our pending transaction at `nonce`, if the txpool shows it.
    async fn stuck_gas_price(&self, address: Address, nonce: U256) -> Option<U256> {
        let content = match self.rpc.txpool_content().await {
            Ok(content) => content,
            Err(e) => {
                debug!("txpool_content unavailable: {}", e);
                return None;
            }
        };
        content
            .pending
            .get(&address)?
            .values()
            .find(|tx| tx.nonce == nonce)
            .and_then(|tx| tx.gas_price)
    }
}
