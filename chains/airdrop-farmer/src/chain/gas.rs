//! Third-party gas oracle (Etherscan-style `gastracker` API).

use ethers::types::U256;
use ethers::utils::parse_units;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::error::ChainError;

#[derive(Debug, Deserialize)]
struct OracleResponse {
    result: OracleResult,
}

/// Prices are gwei, encoded as strings. `ProposeGasPrice` and
/// `FastGasPrice` are also returned but not used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OracleResult {
    safe_gas_price: String,
}

/// Fetches the oracle's "safe" price and returns it in wei, at least 1 gwei.
pub async fn fetch_safe_gas_price(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<U256, ChainError> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ChainError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ChainError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let parsed: OracleResponse =
        serde_json::from_str(&body).map_err(|e| ChainError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let gwei = parsed.result.safe_gas_price.trim();
    let wei: U256 = parse_units(gwei, "gwei")
        .map_err(|e| ChainError::InvalidResponse {
            url: url.to_string(),
            reason: format!("SafeGasPrice '{}': {}", gwei, e),
        })?
        .into();

    debug!("Oracle safe gas price: {} gwei", gwei);
    Ok(wei.max(U256::exp10(9)))
}
