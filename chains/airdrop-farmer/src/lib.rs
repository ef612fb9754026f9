//! # Airdrop Farmer
//!
//! Runs declarative airdrop actions (DeFi transactions, Discord messages,
//! tweets) for every wallet of a user, one cancellable task per user.
//!
//! - [`catalog`] loads airdrop definitions from JSON files
//! - [`orchestrator`] sequences airdrops, wallets and actions
//! - [`action`] holds the action model, placeholder resolution and dispatch
//! - [`chain`] builds, signs, submits and confirms EVM transactions

pub mod action;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod orchestrator;
pub mod platform;
pub mod session;

pub use action::{ActionExecutor, ActionOutcome, ActionSpec, Dispatcher, Platform};
pub use catalog::{AirdropDefinition, Catalog};
pub use config::FarmerConfig;
pub use orchestrator::{DelayPolicy, ExecutionState, Orchestrator, RunReport};
pub use session::UserSession;
