use ethers::types::{Address, Bytes, NameOrAddress, TransactionRequest, H256, U256};
use ethers::utils::format_units;
use serde::Serialize;
use std::collections::HashMap;

/// What to call, before gas, nonce and chain id are filled in.
#[derive(Debug, Clone, Default)]
pub struct TxCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Skips estimation when set
    pub gas: Option<U256>,
    /// Skips the gas price strategy when set
    pub gas_price: Option<U256>,
    /// Pins the nonce, used when replacing a stuck transaction
    pub nonce: Option<U256>,
}

impl TxCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            ..Default::default()
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

/// A built, unsigned transaction with its fee preview.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreparedTx {
    pub blockchain: String,
    pub chain_id: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas: U256,
    pub gas_price: U256,
    pub nonce: U256,
    /// `gas * gas_price`, the most this transaction can cost
    pub fee_wei: U256,
}

impl PreparedTx {
    pub fn from_request(blockchain: &str, tx: &TransactionRequest) -> Self {
        let gas = tx.gas.unwrap_or_default();
        let gas_price = tx.gas_price.unwrap_or_default();
        Self {
            blockchain: blockchain.to_string(),
            chain_id: tx.chain_id.map(|id| id.as_u64()).unwrap_or_default(),
            from: tx.from.unwrap_or_default(),
            to: match &tx.to {
                Some(NameOrAddress::Address(addr)) => Some(*addr),
                _ => None,
            },
            value: tx.value.unwrap_or_default(),
            data: tx.data.clone().unwrap_or_default(),
            gas,
            gas_price,
            nonce: tx.nonce.unwrap_or_default(),
            fee_wei: gas.saturating_mul(gas_price),
        }
    }

    pub fn fee_eth(&self) -> String {
        format_units(self.fee_wei, "ether").unwrap_or_else(|_| self.fee_wei.to_string())
    }
}

/// How a transaction left the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome {
    /// Mined; `success` mirrors the receipt status.
    Mined { hash: H256, success: bool },
    /// Watch-only wallet: built but never signed. Multi-step protocols carry
    /// every step in order.
    Prepared(Vec<PreparedTx>),
}

impl TxOutcome {
    pub fn hash(&self) -> Option<H256> {
        match self {
            TxOutcome::Mined { hash, .. } => Some(*hash),
            TxOutcome::Prepared(_) => None,
        }
    }
}

/// Renumbers unsigned transactions so that, per chain and sender, each one
/// takes the nonce after the previous one. Nothing is submitted between
/// prepared steps, so they are all built against the same pending count.
pub fn sequence_nonces(txs: &mut [PreparedTx]) {
    let mut next: HashMap<(String, Address), U256> = HashMap::new();
    for tx in txs.iter_mut() {
        let slot = next
            .entry((tx.blockchain.clone(), tx.from))
            .or_insert(tx.nonce);
        tx.nonce = (*slot).max(tx.nonce);
        *slot = tx.nonce.saturating_add(U256::one());
    }
}

/// Collects the prepared steps of a multi-step protocol.
#[derive(Debug, Default)]
pub(crate) struct StepLog {
    prepared: Vec<PreparedTx>,
}

impl StepLog {
    pub fn record(&mut self, outcome: TxOutcome) {
        if let TxOutcome::Prepared(steps) = outcome {
            self.prepared.extend(steps);
        }
    }

    /// Folds the final step into the outcome returned to the caller.
    pub fn finish(mut self, last: TxOutcome) -> TxOutcome {
        match last {
            TxOutcome::Prepared(steps) => {
                self.prepared.extend(steps);
                sequence_nonces(&mut self.prepared);
                TxOutcome::Prepared(self.prepared)
            }
            mined => mined,
        }
    }
}
