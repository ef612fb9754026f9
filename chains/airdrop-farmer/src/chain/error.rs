use core_logic::ConfigError;
use ethers::types::{Address, H256, U256};
use std::fmt;
use thiserror::Error;

use crate::config::ErrorPatternsToml;

/// Why a node refused a raw transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    InsufficientFunds,
    Underpriced,
    NonceTooLow,
    AlreadyKnown,
    Unclassified,
}

impl fmt::Display for SubmitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmitErrorKind::InsufficientFunds => "insufficient funds",
            SubmitErrorKind::Underpriced => "underpriced",
            SubmitErrorKind::NonceTooLow => "nonce too low",
            SubmitErrorKind::AlreadyKnown => "already known",
            SubmitErrorKind::Unclassified => "submission rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not connected to {chain}")]
    NotConnected { chain: String },

    #[error("RPC {method} failed: {message}")]
    Rpc {
        method: &'static str,
        message: String,
    },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Error estimating gas limit: {0}")]
    GasEstimate(String),

    #[error("Insufficient {asset} balance: have {have}, need {need}")]
    InsufficientBalance {
        asset: String,
        have: U256,
        need: U256,
    },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("{kind}: {message}")]
    Submit {
        kind: SubmitErrorKind,
        message: String,
    },

    #[error("Transaction {hash:?} has not been mined after {timeout_secs}s")]
    TimedOut { hash: H256, timeout_secs: u64 },

    #[error("Transaction {hash:?} not found")]
    NotFound { hash: H256 },

    #[error("{step} transaction {hash:?} reverted")]
    StepReverted { step: &'static str, hash: H256 },

    #[error("No pending transaction for {address:?}")]
    NothingPending { address: Address },

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Cancelled")]
    Cancelled,
}

impl ChainError {
    /// Only configuration problems abort a run; everything else is a
    /// per-action "no result".
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Config(_))
    }

    pub(crate) fn rpc(method: &'static str, err: impl fmt::Display) -> Self {
        ChainError::Rpc {
            method,
            message: err.to_string(),
        }
    }

    pub(crate) fn abi(err: impl fmt::Display) -> Self {
        ChainError::Abi(err.to_string())
    }

    /// Node message carried by this error, if it came from the node.
    pub fn node_message(&self) -> Option<&str> {
        match self {
            ChainError::Rpc { message, .. } | ChainError::Submit { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Lower-cased substrings used to classify node error messages.
#[derive(Debug, Clone)]
pub struct ErrorPatterns {
    pub insufficient_funds: Vec<String>,
    pub underpriced: Vec<String>,
    pub nonce_too_low: Vec<String>,
    pub already_known: Vec<String>,
    /// Estimation failures that fall back to the default gas limit
    pub gas_fallback: Vec<String>,
}

fn lowered(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_lowercase()).collect()
}

impl Default for ErrorPatterns {
    fn default() -> Self {
        Self {
            insufficient_funds: lowered(&[
                "insufficient funds for gas * price + value",
                "insufficient funds",
            ]),
            underpriced: lowered(&[
                "replacement transaction underpriced",
                "transaction underpriced",
                "max fee per gas less than block base fee",
            ]),
            nonce_too_low: lowered(&["nonce too low"]),
            already_known: lowered(&["already known", "known transaction"]),
            gas_fallback: lowered(&["insufficient msg.value", "execution reverted"]),
        }
    }
}

impl From<&ErrorPatternsToml> for ErrorPatterns {
    fn from(toml: &ErrorPatternsToml) -> Self {
        let defaults = ErrorPatterns::default();
        let pick = |custom: &Option<Vec<String>>, fallback: Vec<String>| match custom {
            Some(list) => list.iter().map(|p| p.to_lowercase()).collect(),
            None => fallback,
        };
        Self {
            insufficient_funds: pick(&toml.insufficient_funds, defaults.insufficient_funds),
            underpriced: pick(&toml.underpriced, defaults.underpriced),
            nonce_too_low: pick(&toml.nonce_too_low, defaults.nonce_too_low),
            already_known: pick(&toml.already_known, defaults.already_known),
            gas_fallback: pick(&toml.gas_fallback, defaults.gas_fallback),
        }
    }
}

fn matches_any(message: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| message.contains(p.as_str()))
}

impl ErrorPatterns {
    pub fn classify_submit(&self, message: &str) -> SubmitErrorKind {
        let message = message.to_lowercase();
        if matches_any(&message, &self.insufficient_funds) {
            SubmitErrorKind::InsufficientFunds
        } else if matches_any(&message, &self.underpriced) {
            SubmitErrorKind::Underpriced
        } else if matches_any(&message, &self.nonce_too_low) {
            SubmitErrorKind::NonceTooLow
        } else if matches_any(&message, &self.already_known) {
            SubmitErrorKind::AlreadyKnown
        } else {
            SubmitErrorKind::Unclassified
        }
    }

    pub fn allows_gas_fallback(&self, message: &str) -> bool {
        matches_any(&message.to_lowercase(), &self.gas_fallback)
    }
}
