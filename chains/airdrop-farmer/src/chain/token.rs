//! Native and ERC-20 balance, allowance and transfer operations.

use core_logic::with_retry;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use ethers::utils::{format_units, to_checksum};
use tracing::{debug, error, info, warn};

use super::abi::encode_call;
use super::client::{check_step, ChainClient};
use super::error::ChainError;
use super::tx::{TxCall, TxOutcome};
use super::wallet::ChainWallet;

pub(super) fn first_uint(tokens: Vec<Token>, what: &str) -> Result<U256, ChainError> {
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(ChainError::Abi(format!(
            "{} returned {:?}, expected uint",
            what, other
        ))),
    }
}

impl ChainClient {
    /// Native balance, logged in ether.
    pub async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        let balance = with_retry(&self.settings.read_retry, "eth_getBalance", || {
            self.rpc.balance(address)
        })
        .await?;
        info!(
            "Balance of {} : {} ETH",
            to_checksum(&address, None),
            format_units(balance, "ether").unwrap_or_else(|_| balance.to_string())
        );
        Ok(balance)
    }

    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let function = self
            .spec
            .erc20_abi
            .function("balanceOf")
            .map_err(ChainError::abi)?;
        let out = self.read(token, function, &[Token::Address(owner)]).await?;
        first_uint(out, "balanceOf")
    }

    /// Symbol for log lines; falls back to the checksummed address.
    pub async fn token_symbol(&self, token: Address) -> String {
        let fallback = to_checksum(&token, None);
        let function = match self.spec.erc20_abi.function("symbol") {
            Ok(function) => function,
            Err(_) => return fallback,
        };
        match self.read(token, function, &[]).await {
            Ok(out) => match out.into_iter().next() {
                Some(Token::String(symbol)) if !symbol.is_empty() => symbol,
                _ => fallback,
            },
            Err(e) => {
                debug!("symbol() failed for {}: {}", fallback, e);
                fallback
            }
        }
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let function = self
            .spec
            .erc20_abi
            .function("allowance")
            .map_err(ChainError::abi)?;
        let out = self
            .read(
                token,
                function,
                &[Token::Address(owner), Token::Address(spender)],
            )
            .await?;
        first_uint(out, "allowance")
    }

    pub async fn approve(
        &self,
        wallet: &ChainWallet,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        let function = self
            .spec
            .erc20_abi
            .function("approve")
            .map_err(ChainError::abi)?;
        let data = encode_call(function, &[Token::Address(spender), Token::Uint(amount)])?;
        info!(
            "Approving {} of {} for spender {}",
            amount,
            to_checksum(&token, None),
            to_checksum(&spender, None)
        );
        self.send(wallet, TxCall::new(token, data)).await
    }

    /// Makes sure `spender` may move at least `amount` of `token`.
    ///
    /// No transaction when the allowance already covers `amount`. A nonzero
    /// but insufficient allowance is reset to 0 first, since some tokens
    /// refuse to change a nonzero allowance. Returns the approval steps taken.
    pub async fn ensure_approval(
        &self,
        wallet: &ChainWallet,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Vec<TxOutcome>, ChainError> {
        let current = self.allowance(token, wallet.address, spender).await?;
        if current >= amount {
            debug!("Allowance {} already covers {}", current, amount);
            return Ok(Vec::new());
        }

        let mut steps = Vec::new();
        if !current.is_zero() {
            info!("Resetting allowance of {} to 0 before approving", current);
            let reset = self.approve(wallet, token, spender, U256::zero()).await?;
            check_step("approve", &reset)?;
            steps.push(reset);
        }

        let approval = self.approve(wallet, token, spender, amount).await?;
        check_step("approve", &approval)?;
        steps.push(approval);
        Ok(steps)
    }

    pub(super) async fn require_native_balance(
        &self,
        owner: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        let balance = self.balance(owner).await?;
        if balance < amount {
            error!(
                "Insufficient balance : {} ETH available, {} ETH needed",
                format_units(balance, "ether").unwrap_or_else(|_| balance.to_string()),
                format_units(amount, "ether").unwrap_or_else(|_| amount.to_string())
            );
            return Err(ChainError::InsufficientBalance {
                asset: "native".to_string(),
                have: balance,
                need: amount,
            });
        }
        Ok(())
    }

    pub(super) async fn require_token_balance(
        &self,
        token: Address,
        owner: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        let balance = self.token_balance(token, owner).await?;
        if balance < amount {
            let symbol = self.token_symbol(token).await;
            error!(
                "Insufficient {} balance : {} available, {} needed",
                symbol, balance, amount
            );
            return Err(ChainError::InsufficientBalance {
                asset: symbol,
                have: balance,
                need: amount,
            });
        }
        Ok(())
    }

    pub async fn transfer_native_token(
        &self,
        wallet: &ChainWallet,
        recipient: Address,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        self.require_native_balance(wallet.address, amount).await?;
        if recipient == wallet.address {
            warn!("Transferring to the sending wallet itself");
        }
        info!(
            "Transferring {} ETH from {} to {}",
            format_units(amount, "ether").unwrap_or_else(|_| amount.to_string()),
            wallet.checksum(),
            to_checksum(&recipient, None)
        );
        self.send(wallet, TxCall::transfer(recipient, amount)).await
    }

    pub async fn transfer_token(
        &self,
        wallet: &ChainWallet,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        self.require_token_balance(token, wallet.address, amount)
            .await?;
        let function = self
            .spec
            .erc20_abi
            .function("transfer")
            .map_err(ChainError::abi)?;
        let data = encode_call(function, &[Token::Address(recipient), Token::Uint(amount)])?;
        info!(
            "Transferring {} {} from {} to {}",
            amount,
            self.token_symbol(token).await,
            wallet.checksum(),
            to_checksum(&recipient, None)
        );
        self.send(wallet, TxCall::new(token, data)).await
    }
}
