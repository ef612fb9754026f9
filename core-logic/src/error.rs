//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Unsupported blockchain: '{chain}'")]
    UnknownChain { chain: String },

    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid ABI in {source_name}: {reason}")]
    InvalidAbi { source_name: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet record errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Wallet not found at index {index} (total wallets: {total})")]
    NotFound { index: usize, total: usize },

    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Private key too short: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },

    #[error("Invalid wallet address: '{address}'")]
    InvalidAddress { address: String },

    #[error("Wallet address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("Unrecognized wallet file {path}: {reason}")]
    InvalidFile { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_chain_message() {
        let err = ConfigError::UnknownChain {
            chain: "mars".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported blockchain: 'mars'");
    }

    #[test]
    fn test_wallet_file_error_names_path() {
        let err = WalletError::InvalidFile {
            path: "wallets/alice.json".to_string(),
            reason: "expected a list".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wallets/alice.json"));
        assert!(msg.contains("expected a list"));
    }
}
