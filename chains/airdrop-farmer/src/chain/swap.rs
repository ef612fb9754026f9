//! Uniswap-V2 style swaps and WETH wrapping.

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use ethers::utils::format_units;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use super::abi::encode_call;
use super::client::{check_step, ChainClient};
use super::error::ChainError;
use super::tx::{StepLog, TxCall, TxOutcome};
use super::wallet::ChainWallet;

const BPS: u64 = 10_000;

/// `floor(amount * (1 - slippage))`, slippage as a fraction in `[0, 1]`.
pub fn apply_slippage(amount: U256, slippage: f64) -> U256 {
    let slippage = if slippage.is_finite() {
        slippage.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let keep = U256::from(BPS - (slippage * BPS as f64).round() as u64);
    match amount.checked_mul(keep) {
        Some(scaled) => scaled / BPS,
        None => amount / BPS * keep,
    }
}

/// Unix timestamp `minutes` from now. Computed in 256 bits, so any catalog
/// value is accepted.
pub fn deadline_after(minutes: u64) -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    U256::from(now) + U256::from(minutes) * U256::from(60u64)
}

#[derive(Debug, Clone)]
pub struct SwapParams<'a> {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub router: Address,
    pub router_abi: &'a Abi,
    pub slippage: f64,
    pub deadline_minutes: u64,
}

impl ChainClient {
    /// Balance check, approval, `getAmountsOut` quote, then
    /// `swapExactTokensForTokens` with the slippage floor.
    pub async fn swap_tokens(
        &self,
        wallet: &ChainWallet,
        params: &SwapParams<'_>,
    ) -> Result<TxOutcome, ChainError> {
        self.require_token_balance(params.token_in, wallet.address, params.amount_in)
            .await?;
        self.swap_exact(wallet, params, StepLog::default()).await
    }

    /// Wraps `amount_in` of native currency, then swaps the wrapped token.
    /// `params.token_in` is replaced by the chain's wrapped native token.
    pub async fn swap_native_token(
        &self,
        wallet: &ChainWallet,
        params: &SwapParams<'_>,
    ) -> Result<TxOutcome, ChainError> {
        let mut steps = StepLog::default();
        let wrap = self.wrap_native_token(wallet, params.amount_in).await?;
        check_step("wrap", &wrap)?;
        steps.record(wrap);

        let wrapped = SwapParams {
            token_in: self.spec.wrapped_native,
            ..params.clone()
        };
        self.swap_exact(wallet, &wrapped, steps).await
    }

    async fn swap_exact(
        &self,
        wallet: &ChainWallet,
        params: &SwapParams<'_>,
        mut steps: StepLog,
    ) -> Result<TxOutcome, ChainError> {
        info!(
            "Swapping {} {} for {} on router {:?}",
            params.amount_in,
            self.token_symbol(params.token_in).await,
            self.token_symbol(params.token_out).await,
            params.router
        );

        for outcome in self
            .ensure_approval(wallet, params.token_in, params.router, params.amount_in)
            .await?
        {
            steps.record(outcome);
        }

        let path = Token::Array(vec![
            Token::Address(params.token_in),
            Token::Address(params.token_out),
        ]);
        let quote = params
            .router_abi
            .function("getAmountsOut")
            .map_err(ChainError::abi)?;
        let amounts = self
            .read(
                params.router,
                quote,
                &[Token::Uint(params.amount_in), path.clone()],
            )
            .await?;
        let estimated_out = amounts
            .into_iter()
            .next()
            .and_then(Token::into_array)
            .and_then(|list| list.last().cloned())
            .and_then(Token::into_uint)
            .ok_or_else(|| ChainError::Abi("getAmountsOut returned no amounts".to_string()))?;
        let min_out = apply_slippage(estimated_out, params.slippage);
        debug!(
            "Estimated output {}, minimum accepted {}",
            estimated_out, min_out
        );

        let swap = params
            .router_abi
            .function("swapExactTokensForTokens")
            .map_err(ChainError::abi)?;
        let data = encode_call(
            swap,
            &[
                Token::Uint(params.amount_in),
                Token::Uint(min_out),
                path,
                Token::Address(wallet.address),
                Token::Uint(deadline_after(params.deadline_minutes)),
            ],
        )?;

        let outcome = self.send(wallet, TxCall::new(params.router, data)).await?;
        Ok(steps.finish(outcome))
    }

    /// WETH `deposit()`.
    pub async fn wrap_native_token(
        &self,
        wallet: &ChainWallet,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        self.require_native_balance(wallet.address, amount).await?;
        let deposit = self
            .spec
            .weth_abi
            .function("deposit")
            .map_err(ChainError::abi)?;
        let data = encode_call(deposit, &[])?;
        info!(
            "Wrapping {} ETH",
            format_units(amount, "ether").unwrap_or_else(|_| amount.to_string())
        );
        self.send(
            wallet,
            TxCall::new(self.spec.wrapped_native, data).value(amount),
        )
        .await
    }

    /// WETH `withdraw(amount)`.
    pub async fn unwrap_native_token(
        &self,
        wallet: &ChainWallet,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        self.require_token_balance(self.spec.wrapped_native, wallet.address, amount)
            .await?;
        let withdraw = self
            .spec
            .weth_abi
            .function("withdraw")
            .map_err(ChainError::abi)?;
        let data = encode_call(withdraw, &[Token::Uint(amount)])?;
        info!(
            "Unwrapping {} WETH",
            format_units(amount, "ether").unwrap_or_else(|_| amount.to_string())
        );
        self.send(wallet, TxCall::new(self.spec.wrapped_native, data))
            .await
    }
}
