use anyhow::{Context, Result};
use ethers::types::Address;
use ethers::utils::to_checksum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::ActionSpec;
use crate::chain::ChainWallet;

/// Replaced by the executing wallet's checksummed address.
pub const WALLET_PLACEHOLDER: &str = "<WALLET_ADDRESS>";

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^0[xX][0-9a-fA-F]{40}$").expect("valid address regex")
});

/// A catalog action bound to one wallet for one dispatch.
///
/// Built fresh per dispatch; the catalog entry is never modified.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub action: ActionSpec,
    pub wallet: ChainWallet,
}

impl ResolvedAction {
    /// Substitutes [`WALLET_PLACEHOLDER`] everywhere in the action, then
    /// rewrites every string that is exactly a 20-byte hex address into its
    /// checksummed form.
    pub fn resolve(action: &ActionSpec, wallet: &ChainWallet) -> Result<Self> {
        let mut value = serde_json::to_value(action).context("Failed to serialize action")?;
        resolve_value(&mut value, &wallet.checksum());
        let action = serde_json::from_value(value)
            .with_context(|| format!("Action '{}' is invalid after resolution", action.name()))?;
        Ok(Self {
            action,
            wallet: wallet.clone(),
        })
    }
}

/// Walks maps and arrays in place.
pub fn resolve_value(value: &mut Value, wallet_address: &str) {
    match value {
        Value::String(s) => {
            if s.contains(WALLET_PLACEHOLDER) {
                *s = s.replace(WALLET_PLACEHOLDER, wallet_address);
            }
            if let Some(checksummed) = checksum_if_address(s) {
                *s = checksummed;
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_value(item, wallet_address);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                resolve_value(item, wallet_address);
            }
        }
        _ => {}
    }
}

fn checksum_if_address(s: &str) -> Option<String> {
    let trimmed = s.trim().trim_matches('"');
    if !ADDRESS_RE.is_match(trimmed) {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    let address: Address = lowered.parse().ok()?;
    Some(to_checksum(&address, None))
}
