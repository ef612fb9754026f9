//! # Core Logic - Shared Utilities for the Airdrop Farmer
//!
//! This crate provides the chain-agnostic pieces used by the farming engine:
//! wallet record loading, gas unit configuration, logging, retries and the
//! multi-session runner.
//!
//! ## Modules
//!
//! - [`config`] - Wallet source and delay configuration
//! - [`error`] - Typed error handling with thiserror
//! - [`traits`] - Core trait definitions (sessions, platform adapters, wallet loaders)
//! - [`utils`] - Utility modules (wallets, gas units, logger, retry, runner)

pub mod config;
pub mod error;
pub mod traits;
pub(crate) mod utils;

pub use config::{DelayConfig, WalletSource};
pub use error::{ConfigError, WalletError};
pub use traits::{FarmingSession, FarmingStats, PlatformAdapter, WalletLoader};

// Utils are pub(crate) - only export specific public utilities
pub use utils::gas::{scale_by, GasConfig, GasConfigToml};
pub use utils::{setup_logger, SessionRunner, WalletManager, WalletRecord};

pub use utils::retry::{is_transient_message, with_retry, RetryConfig};
