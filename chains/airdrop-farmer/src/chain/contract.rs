use ethers::abi::Abi;
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use tracing::info;

use super::abi::{bind_function, encode_call, CallArgs};
use super::client::ChainClient;
use super::error::ChainError;
use super::tx::{TxCall, TxOutcome};
use super::wallet::ChainWallet;

impl ChainClient {
    /// Calls `function_name` on `contract`, binding keyword or positional
    /// arguments to the matching overload.
    pub async fn interact_with_contract(
        &self,
        wallet: &ChainWallet,
        contract: Address,
        abi: &Abi,
        function_name: &str,
        args: &CallArgs,
        msg_value: U256,
    ) -> Result<TxOutcome, ChainError> {
        let (function, tokens) = bind_function(abi, function_name, args)?;
        let data = encode_call(function, &tokens)?;

        info!(
            "Calling {}({}) on {} with value {}",
            function.name,
            function
                .inputs
                .iter()
                .map(|p| p.kind.to_string())
                .collect::<Vec<_>>()
                .join(","),
            to_checksum(&contract, None),
            msg_value
        );
        self.send(wallet, TxCall::new(contract, data).value(msg_value))
            .await
    }
}
