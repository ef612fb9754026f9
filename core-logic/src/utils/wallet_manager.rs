use crate::config::WalletSource;
use crate::error::WalletError;
use crate::traits::WalletLoader;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One wallet as handed over by the wallet store.
///
/// `private_key == None` is a watch-only wallet: transactions are built for
/// preview but never signed.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub private_key: Option<String>,
}

impl WalletRecord {
    pub fn new(address: impl Into<String>, private_key: Option<String>) -> Self {
        Self {
            address: address.into(),
            private_key,
        }
    }

    pub fn watch_only(address: impl Into<String>) -> Self {
        Self::new(address, None)
    }

    pub fn can_sign(&self) -> bool {
        self.private_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "***REDACTED***"),
            )
            .finish()
    }
}

/// Loads one user's wallets from disk.
///
/// Two formats are accepted: a JSON array of `{address, private_key}`
/// records, or a `pv.txt` style file with one private key per line (`#`
/// comments allowed). Keys from the plain format carry no address; the chain
/// layer derives it from the key.
pub struct WalletManager {
    path: PathBuf,
    wallets: Vec<WalletRecord>,
}

impl WalletManager {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let content = fs::read_to_string(&path).map_err(|e| WalletError::InvalidFile {
            path: shown.clone(),
            reason: e.to_string(),
        })?;

        let wallets = if content.trim_start().starts_with('[') {
            debug!("Parsing {} as a JSON wallet list", shown);
            serde_json::from_str::<Vec<WalletRecord>>(&content).map_err(|e| {
                WalletError::InvalidFile {
                    path: shown.clone(),
                    reason: e.to_string(),
                }
            })?
        } else {
            debug!("Parsing {} as a raw key list", shown);
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| WalletRecord::new(String::new(), Some(line.to_string())))
                .collect()
        };

        for wallet in &wallets {
            if let Some(key) = wallet.private_key.as_deref() {
                validate_private_key(key)?;
            }
            if wallet.address.is_empty() && !wallet.can_sign() {
                return Err(WalletError::InvalidFile {
                    path: shown,
                    reason: "wallet has neither an address nor a private key".to_string(),
                });
            }
        }

        info!("[WalletManager] Loaded {} wallets from {}", wallets.len(), shown);

        Ok(Self { path, wallets })
    }

    /// Resolves a [`WalletSource`]: a file path, or a single key held in an
    /// environment variable.
    pub fn from_source(source: &WalletSource) -> Result<Self, WalletError> {
        match source {
            WalletSource::File { path } => Self::load(path),
            WalletSource::Env { key } => {
                let private_key = std::env::var(key).map_err(|_| WalletError::InvalidFile {
                    path: format!("${}", key),
                    reason: "environment variable is not set".to_string(),
                })?;
                validate_private_key(private_key.trim())?;
                Ok(Self {
                    path: PathBuf::new(),
                    wallets: vec![WalletRecord::new(
                        String::new(),
                        Some(private_key.trim().to_string()),
                    )],
                })
            }
        }
    }

    pub fn from_records(wallets: Vec<WalletRecord>) -> Self {
        Self {
            path: PathBuf::new(),
            wallets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of available wallets
    pub fn count(&self) -> usize {
        self.wallets.len()
    }

    pub fn wallets(&self) -> &[WalletRecord] {
        &self.wallets
    }

    pub fn get(&self, index: usize) -> Result<&WalletRecord, WalletError> {
        self.wallets.get(index).ok_or(WalletError::NotFound {
            index,
            total: self.wallets.len(),
        })
    }
}

#[async_trait]
impl WalletLoader for WalletManager {
    type Wallet = WalletRecord;

    async fn load_wallets(&self) -> Result<Vec<WalletRecord>> {
        Ok(self.wallets.clone())
    }
}

fn validate_private_key(key: &str) -> Result<(), WalletError> {
    let stripped = key.strip_prefix("0x").unwrap_or(key);
    if stripped.len() != 64 {
        return Err(WalletError::InvalidKeyLength {
            length: stripped.len(),
        });
    }
    if hex::decode(stripped).is_err() {
        return Err(WalletError::InvalidKeyFormat);
    }
    Ok(())
}
