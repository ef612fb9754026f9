use anyhow::{Context, Result};
use config::{Config, Environment, File};
use core_logic::{DelayConfig, GasConfig, GasConfigToml};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::action::Platform;

#[derive(Debug, Deserialize, Clone)]
pub struct FarmerConfig {
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_min_wait")]
    pub min_wait_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default = "default_tx_timeout")]
    pub transaction_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub gas: GasConfigToml,
    #[serde(default)]
    pub platform_wait_secs: PlatformWaits,
    #[serde(default)]
    pub chains: HashMap<String, ChainSettings>,
}

/// Per-platform fixed wait, in seconds, applied after an action of that platform.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PlatformWaits {
    pub defi: Option<u64>,
    pub discord: Option<u64>,
    pub twitter: Option<u64>,
}

impl PlatformWaits {
    pub fn get(&self, platform: Platform) -> Option<u64> {
        match platform {
            Platform::Defi => self.defi,
            Platform::Discord => self.discord,
            Platform::Twitter => self.twitter,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub rpc_url: String,
    pub explorer_url: String,
    pub wrapped_native: String,
    pub gas_oracle_url: Option<String>,
    pub erc20_abi_path: Option<String>,
    pub weth_abi_path: Option<String>,
    #[serde(default)]
    pub error_patterns: ErrorPatternsToml,
}

/// Node error substrings, each list replacing the built-in one when set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ErrorPatternsToml {
    pub insufficient_funds: Option<Vec<String>>,
    pub underpriced: Option<Vec<String>>,
    pub nonce_too_low: Option<Vec<String>>,
    pub already_known: Option<Vec<String>>,
    pub gas_fallback: Option<Vec<String>>,
}

fn default_catalog_dir() -> String {
    "airdrops".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_min_wait() -> u64 {
    DelayConfig::default().min_wait_secs
}

fn default_max_wait() -> u64 {
    DelayConfig::default().max_wait_secs
}

fn default_tx_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_http_timeout() -> u64 {
    10
}

impl FarmerConfig {
    /// Reads the TOML file, then lets `FARMER__*` environment variables override it.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FARMER").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        let config: FarmerConfig = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_wait_secs > self.max_wait_secs {
            anyhow::bail!(
                "min_wait_secs ({}) is greater than max_wait_secs ({})",
                self.min_wait_secs,
                self.max_wait_secs
            );
        }
        if self.receipt_poll_interval_ms == 0 {
            anyhow::bail!("receipt_poll_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn delay(&self) -> DelayConfig {
        DelayConfig::new(self.min_wait_secs, self.max_wait_secs)
    }

    pub fn gas_config(&self) -> GasConfig {
        GasConfig::from(self.gas.clone())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults_and_chains() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            min_wait_secs = 1
            max_wait_secs = 2

            [gas]
            gas_price_multiplier = 1.5

            [platform_wait_secs]
            discord = 60

            [chains.goerli]
            rpc_url = "http://localhost:8545"
            explorer_url = "https://goerli.etherscan.io/tx/"
            wrapped_native = "0xB4FBF271143F4FBf7B91A5ded31805e42b2208d6"
            "#
        )
        .unwrap();

        let config = FarmerConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.transaction_timeout(), Duration::from_secs(120));
        assert_eq!(config.receipt_poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.delay(), DelayConfig::new(1, 2));
        assert_eq!(config.gas_config().price_multiplier, 1.5);
        assert_eq!(config.gas_config().limit_fallback(), 100_000);
        assert_eq!(config.platform_wait_secs.get(Platform::Discord), Some(60));
        assert_eq!(config.platform_wait_secs.get(Platform::Defi), None);
        assert!(config.chains.contains_key("goerli"));
        assert!(config.chains["goerli"].gas_oracle_url.is_none());
    }

    #[test]
    fn test_inverted_wait_window_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "min_wait_secs = 10\nmax_wait_secs = 2").unwrap();
        assert!(FarmerConfig::load(file.path().to_str().unwrap()).is_err());
    }
}
