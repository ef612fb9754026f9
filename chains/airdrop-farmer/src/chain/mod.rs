//! EVM chain access: registry, RPC seam, the per-action client and the
//! protocols built on it.

pub mod abi;
pub mod aggregator;
mod cancel;
pub mod client;
mod contract;
pub mod error;
pub mod gas;
pub mod liquidity;
pub mod registry;
pub mod rpc;
pub mod swap;
mod token;
pub mod tx;
pub mod wallet;

pub use abi::CallArgs;
pub use aggregator::{ApiApproval, ApiRequest, HttpMethod};
pub use cancel::replacement_price;
pub use client::{ChainClient, ClientSettings};
pub use error::{ChainError, ErrorPatterns, SubmitErrorKind};
pub use liquidity::{AddLiquidityParams, RemoveLiquidityParams, TokenRef};
pub use registry::{ChainRegistry, ChainSpec};
pub use rpc::{ChainRpc, EthersRpc, HttpConnector, RpcConnector};
pub use swap::SwapParams;
pub use tx::{sequence_nonces, PreparedTx, TxCall, TxOutcome};
pub use wallet::ChainWallet;
