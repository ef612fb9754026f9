//! Uniswap-V2 router liquidity, with the `*ETH` variants for a native leg.

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use std::str::FromStr;
use tracing::info;

use super::abi::encode_call;
use super::client::ChainClient;
use super::error::ChainError;
use super::swap::{apply_slippage, deadline_after};
use super::tx::{StepLog, TxCall, TxOutcome};
use super::wallet::ChainWallet;

/// One leg of a pair: native currency or an ERC-20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRef {
    Native,
    Erc20(Address),
}

impl FromStr for TokenRef {
    type Err = String;

    /// `"native"` (any case) or a token address.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("native") {
            return Ok(TokenRef::Native);
        }
        raw.parse::<Address>()
            .map(TokenRef::Erc20)
            .map_err(|_| format!("'{}' is neither \"native\" nor an address", raw))
    }
}

#[derive(Debug, Clone)]
pub struct AddLiquidityParams<'a> {
    pub token_a: TokenRef,
    pub token_b: TokenRef,
    pub amount_a: U256,
    pub amount_b: U256,
    pub router: Address,
    pub router_abi: &'a Abi,
    pub slippage: f64,
    pub deadline_minutes: u64,
}

#[derive(Debug, Clone)]
pub struct RemoveLiquidityParams<'a> {
    pub token_a: TokenRef,
    pub token_b: TokenRef,
    /// LP token, approved to the router before burning
    pub pair: Address,
    pub liquidity: U256,
    pub amount_a_min: U256,
    pub amount_b_min: U256,
    pub router: Address,
    pub router_abi: &'a Abi,
    pub deadline_minutes: u64,
}

fn both_native() -> ChainError {
    ChainError::InvalidArgument {
        field: "token_a_address/token_b_address".to_string(),
        reason: "both legs are native".to_string(),
    }
}

impl ChainClient {
    pub async fn add_liquidity(
        &self,
        wallet: &ChainWallet,
        params: &AddLiquidityParams<'_>,
    ) -> Result<TxOutcome, ChainError> {
        let to = wallet.address;
        let deadline = deadline_after(params.deadline_minutes);
        let mut steps = StepLog::default();

        let call = match (params.token_a, params.token_b) {
            (TokenRef::Native, TokenRef::Native) => return Err(both_native()),
            (TokenRef::Erc20(token), TokenRef::Native)
            | (TokenRef::Native, TokenRef::Erc20(token)) => {
                let (token_amount, eth_amount) = if params.token_a == TokenRef::Native {
                    (params.amount_b, params.amount_a)
                } else {
                    (params.amount_a, params.amount_b)
                };
                self.require_token_balance(token, to, token_amount).await?;
                self.require_native_balance(to, eth_amount).await?;
                for outcome in self
                    .ensure_approval(wallet, token, params.router, token_amount)
                    .await?
                {
                    steps.record(outcome);
                }

                info!(
                    "Adding liquidity : {} {} + {} ETH",
                    token_amount,
                    self.token_symbol(token).await,
                    eth_amount
                );
                let function = params
                    .router_abi
                    .function("addLiquidityETH")
                    .map_err(ChainError::abi)?;
                let data = encode_call(
                    function,
                    &[
                        Token::Address(token),
                        Token::Uint(token_amount),
                        Token::Uint(apply_slippage(token_amount, params.slippage)),
                        Token::Uint(apply_slippage(eth_amount, params.slippage)),
                        Token::Address(to),
                        Token::Uint(deadline),
                    ],
                )?;
                TxCall::new(params.router, data).value(eth_amount)
            }
            (TokenRef::Erc20(token_a), TokenRef::Erc20(token_b)) => {
                self.require_token_balance(token_a, to, params.amount_a)
                    .await?;
                self.require_token_balance(token_b, to, params.amount_b)
                    .await?;
                for (token, amount) in [(token_a, params.amount_a), (token_b, params.amount_b)] {
                    for outcome in self
                        .ensure_approval(wallet, token, params.router, amount)
                        .await?
                    {
                        steps.record(outcome);
                    }
                }

                info!(
                    "Adding liquidity : {} {} + {} {}",
                    params.amount_a,
                    self.token_symbol(token_a).await,
                    params.amount_b,
                    self.token_symbol(token_b).await
                );
                let function = params
                    .router_abi
                    .function("addLiquidity")
                    .map_err(ChainError::abi)?;
                let data = encode_call(
                    function,
                    &[
                        Token::Address(token_a),
                        Token::Address(token_b),
                        Token::Uint(params.amount_a),
                        Token::Uint(params.amount_b),
                        Token::Uint(apply_slippage(params.amount_a, params.slippage)),
                        Token::Uint(apply_slippage(params.amount_b, params.slippage)),
                        Token::Address(to),
                        Token::Uint(deadline),
                    ],
                )?;
                TxCall::new(params.router, data)
            }
        };

        let outcome = self.send(wallet, call).await?;
        Ok(steps.finish(outcome))
    }

    pub async fn remove_liquidity(
        &self,
        wallet: &ChainWallet,
        params: &RemoveLiquidityParams<'_>,
    ) -> Result<TxOutcome, ChainError> {
        let to = wallet.address;
        let deadline = deadline_after(params.deadline_minutes);

        let data = match (params.token_a, params.token_b) {
            (TokenRef::Native, TokenRef::Native) => return Err(both_native()),
            (TokenRef::Erc20(token), TokenRef::Native)
            | (TokenRef::Native, TokenRef::Erc20(token)) => {
                let (token_min, eth_min) = if params.token_a == TokenRef::Native {
                    (params.amount_b_min, params.amount_a_min)
                } else {
                    (params.amount_a_min, params.amount_b_min)
                };
                let function = params
                    .router_abi
                    .function("removeLiquidityETH")
                    .map_err(ChainError::abi)?;
                encode_call(
                    function,
                    &[
                        Token::Address(token),
                        Token::Uint(params.liquidity),
                        Token::Uint(token_min),
                        Token::Uint(eth_min),
                        Token::Address(to),
                        Token::Uint(deadline),
                    ],
                )?
            }
            (TokenRef::Erc20(token_a), TokenRef::Erc20(token_b)) => {
                let function = params
                    .router_abi
                    .function("removeLiquidity")
                    .map_err(ChainError::abi)?;
                encode_call(
                    function,
                    &[
                        Token::Address(token_a),
                        Token::Address(token_b),
                        Token::Uint(params.liquidity),
                        Token::Uint(params.amount_a_min),
                        Token::Uint(params.amount_b_min),
                        Token::Address(to),
                        Token::Uint(deadline),
                    ],
                )?
            }
        };

        self.require_token_balance(params.pair, to, params.liquidity)
            .await?;
        let mut steps = StepLog::default();
        for outcome in self
            .ensure_approval(wallet, params.pair, params.router, params.liquidity)
            .await?
        {
            steps.record(outcome);
        }

        info!(
            "Removing {} liquidity from pair {:?}",
            params.liquidity, params.pair
        );
        let outcome = self.send(wallet, TxCall::new(params.router, data)).await?;
        Ok(steps.finish(outcome))
    }
}
