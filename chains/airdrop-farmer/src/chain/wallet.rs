use core_logic::{WalletError, WalletRecord};
use ethers::prelude::*;
use ethers::utils::to_checksum;
use std::fmt;

/// A wallet ready for the chain client: a parsed address and, unless
/// watch-only, the signing key.
#[derive(Clone)]
pub struct ChainWallet {
    pub address: Address,
    signer: Option<LocalWallet>,
}

impl ChainWallet {
    pub fn from_record(record: &WalletRecord) -> Result<Self, WalletError> {
        let signer = match record.private_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Some(
                key.trim()
                    .parse::<LocalWallet>()
                    .map_err(|_| WalletError::InvalidKeyFormat)?,
            ),
            None => None,
        };

        let declared = if record.address.trim().is_empty() {
            None
        } else {
            Some(parse_address(&record.address)?)
        };

        let address = match (&signer, declared) {
            (Some(signer), Some(declared)) if signer.address() != declared => {
                return Err(WalletError::AddressMismatch {
                    expected: to_checksum(&declared, None),
                    actual: to_checksum(&signer.address(), None),
                });
            }
            (_, Some(declared)) => declared,
            (Some(signer), None) => signer.address(),
            (None, None) => {
                return Err(WalletError::InvalidAddress {
                    address: String::new(),
                })
            }
        };

        Ok(Self { address, signer })
    }

    /// Builds unsigned transactions only.
    pub fn watch_only(address: Address) -> Self {
        Self {
            address,
            signer: None,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer(&self) -> Option<&LocalWallet> {
        self.signer.as_ref()
    }

    pub fn checksum(&self) -> String {
        to_checksum(&self.address, None)
    }
}

impl fmt::Debug for ChainWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainWallet")
            .field("address", &self.checksum())
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

fn parse_address(raw: &str) -> Result<Address, WalletError> {
    raw.trim()
        .trim_matches('"')
        .parse::<Address>()
        .map_err(|_| WalletError::InvalidAddress {
            address: raw.to_string(),
        })
}
