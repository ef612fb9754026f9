use core_logic::ConfigError;
use ethers::abi::Abi;
use ethers::types::Address;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::error::ErrorPatterns;
use crate::config::ChainSettings;

const ERC20_ABI: &str = include_str!("../../abi/erc20.json");
const WETH_ABI: &str = include_str!("../../abi/weth.json");
const ROUTER_ABI: &str = include_str!("../../abi/uniswap_v2_router.json");

/// Everything the client needs to know about one network.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub id: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub wrapped_native: Address,
    pub gas_oracle_url: Option<String>,
    pub erc20_abi: Abi,
    pub weth_abi: Abi,
    /// Used by swap/liquidity actions that do not ship their own router ABI
    pub router_abi: Abi,
    pub error_patterns: ErrorPatterns,
}

#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<String, Arc<ChainSpec>>,
}

fn parse_abi(source_name: &str, content: &str) -> Result<Abi, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::InvalidAbi {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

fn load_abi(path: Option<&str>, builtin_name: &str, builtin: &str) -> Result<Abi, ConfigError> {
    match path {
        None => parse_abi(builtin_name, builtin),
        Some(path) => {
            if !Path::new(path).exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_string(),
                });
            }
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
                path: path.to_string(),
                msg: e.to_string(),
            })?;
            parse_abi(path, &content)
        }
    }
}

impl ChainSpec {
    pub fn from_settings(id: &str, settings: &ChainSettings) -> Result<Self, ConfigError> {
        let wrapped_native: Address =
            settings
                .wrapped_native
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    field: format!("chains.{}.wrapped_native", id),
                    reason: format!("'{}' is not an address", settings.wrapped_native),
                })?;

        Ok(Self {
            id: id.to_string(),
            rpc_url: settings.rpc_url.clone(),
            explorer_url: settings.explorer_url.clone(),
            wrapped_native,
            gas_oracle_url: settings.gas_oracle_url.clone().filter(|u| !u.is_empty()),
            erc20_abi: load_abi(settings.erc20_abi_path.as_deref(), "erc20.json", ERC20_ABI)?,
            weth_abi: load_abi(settings.weth_abi_path.as_deref(), "weth.json", WETH_ABI)?,
            router_abi: parse_abi("uniswap_v2_router.json", ROUTER_ABI)?,
            error_patterns: ErrorPatterns::from(&settings.error_patterns),
        })
    }

    /// Link to a transaction on the chain's explorer.
    pub fn explorer_link(&self, hash: &ethers::types::H256) -> String {
        format!("{}{:?}", self.explorer_url, hash)
    }
}

impl ChainRegistry {
    pub fn from_settings(chains: &HashMap<String, ChainSettings>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for (id, settings) in chains {
            registry.insert(ChainSpec::from_settings(id, settings)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, spec: ChainSpec) {
        self.chains.insert(spec.id.clone(), Arc::new(spec));
    }

    /// Fails with `UnknownChain` for identifiers that are not configured.
    pub fn get(&self, blockchain: &str) -> Result<Arc<ChainSpec>, ConfigError> {
        self.chains
            .get(blockchain)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownChain {
                chain: blockchain.to_string(),
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorPatternsToml;

    fn settings() -> ChainSettings {
        ChainSettings {
            rpc_url: "http://localhost:8545".to_string(),
            explorer_url: "https://goerli.etherscan.io/tx/".to_string(),
            wrapped_native: "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6".to_string(),
            gas_oracle_url: None,
            erc20_abi_path: None,
            weth_abi_path: None,
            error_patterns: ErrorPatternsToml::default(),
        }
    }

    #[test]
    fn test_builtin_abis_parse() {
        let spec = ChainSpec::from_settings("goerli", &settings()).unwrap();
        assert!(spec.erc20_abi.function("allowance").is_ok());
        assert!(spec.weth_abi.function("deposit").is_ok());
        assert!(spec.router_abi.function("getAmountsOut").is_ok());
        assert!(spec.router_abi.function("removeLiquidityETH").is_ok());
    }

    #[test]
    fn test_unknown_chain_is_config_error() {
        let mut chains = HashMap::new();
        chains.insert("goerli".to_string(), settings());
        let registry = ChainRegistry::from_settings(&chains).unwrap();

        assert!(registry.get("goerli").is_ok());
        assert!(matches!(
            registry.get("solana"),
            Err(ConfigError::UnknownChain { chain }) if chain == "solana"
        ));
    }

    #[test]
    fn test_missing_abi_file_is_config_error() {
        let mut s = settings();
        s.erc20_abi_path = Some("/nope/erc20.json".to_string());
        assert!(matches!(
            ChainSpec::from_settings("goerli", &s),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_bad_wrapped_native() {
        let mut s = settings();
        s.wrapped_native = "weth".to_string();
        assert!(matches!(
            ChainSpec::from_settings("goerli", &s),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
