//! Quote / assemble flow against a swap-aggregator REST API.
//!
//! 1. quote request, the response carries a `pathId`
//! 2. `POST {userAddr, pathId, simulate}` to the assemble endpoint
//! 3. sign and submit the returned `transaction` like any other call

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::abi::parse_u256;
use super::client::ChainClient;
use super::error::ChainError;
use super::tx::{StepLog, TxCall, TxOutcome};
use super::wallet::ChainWallet;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// JSON body for POST, ignored for GET
    #[serde(default)]
    pub body: Option<Value>,
}

/// Token the assembled transaction spends, approved to the transaction's
/// target before submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiApproval {
    pub token: Address,
    pub amount: U256,
}

fn invalid(url: &str, reason: impl Into<String>) -> ChainError {
    ChainError::InvalidResponse {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Turns the aggregator's transaction object into a call, keeping its gas
/// fields when present. A `from` other than the executing wallet is refused.
pub fn normalize_assembled_tx(
    url: &str,
    tx: &Value,
    wallet: Address,
) -> Result<TxCall, ChainError> {
    let field = |name: &str| tx.get(name).filter(|v| !v.is_null());

    let address = |name: &str| -> Result<Option<Address>, ChainError> {
        match field(name) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .and_then(|s| s.trim().parse::<Address>().ok())
                .map(Some)
                .ok_or_else(|| invalid(url, format!("transaction.{} is not an address", name))),
        }
    };
    let integer = |name: &str| -> Result<Option<U256>, ChainError> {
        field(name)
            .map(|v| parse_u256(v).map_err(|e| invalid(url, format!("transaction.{}: {}", name, e))))
            .transpose()
    };

    let to = address("to")?.ok_or_else(|| invalid(url, "transaction.to is missing"))?;
    if let Some(from) = address("from")? {
        if from != wallet {
            return Err(invalid(
                url,
                format!("transaction.from {:?} is not the executing wallet", from),
            ));
        }
    }

    let data = match field("data") {
        None => Bytes::default(),
        Some(v) => {
            let raw = v
                .as_str()
                .ok_or_else(|| invalid(url, "transaction.data is not a string"))?;
            let raw = raw.strip_prefix("0x").unwrap_or(raw);
            hex::decode(raw)
                .map(Bytes::from)
                .map_err(|e| invalid(url, format!("transaction.data: {}", e)))?
        }
    };

    let mut call = TxCall::new(to, data).value(integer("value")?.unwrap_or_default());
    if let Some(gas) = integer("gas")?.or(integer("gasLimit")?) {
        call = call.gas(gas);
    }
    if let Some(price) = integer("gasPrice")? {
        call = call.gas_price(price);
    }
    Ok(call)
}

impl ChainClient {
    async fn http_json(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ChainError> {
        let request = match method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self
                .http
                .post(url)
                .json(body.unwrap_or(&Value::Object(Default::default()))),
        };
        let response = request
            .timeout(self.settings.http_timeout)
            .send()
            .await
            .map_err(|e| invalid(url, e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("Request to {} failed with status {} : {}", url, status, text);
            return Err(ChainError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| invalid(url, e.to_string()))
    }

    pub async fn interact_with_api(
        &self,
        wallet: &ChainWallet,
        quote: &ApiRequest,
        assemble_url: &str,
        simulate: bool,
        approval: Option<ApiApproval>,
    ) -> Result<TxOutcome, ChainError> {
        let quoted = self
            .http_json(quote.method, &quote.url, quote.body.as_ref())
            .await?;
        let path_id = match quoted.get("pathId") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(invalid(&quote.url, "quote has no pathId")),
        };
        info!("Quote received, pathId {}", path_id);

        let request = json!({
            "userAddr": wallet.checksum(),
            "pathId": path_id,
            "simulate": simulate,
        });
        let assembled = self
            .http_json(HttpMethod::Post, assemble_url, Some(&request))
            .await?;
        let tx = assembled
            .get("transaction")
            .ok_or_else(|| invalid(assemble_url, "response has no transaction"))?;
        let call = normalize_assembled_tx(assemble_url, tx, wallet.address)?;
        debug!("Assembled transaction to {:?}, value {}", call.to, call.value);

        let mut steps = StepLog::default();
        if let Some(approval) = approval {
            for outcome in self
                .ensure_approval(wallet, approval.token, call.to, approval.amount)
                .await?
            {
                steps.record(outcome);
            }
        }

        let outcome = self.send(wallet, call).await?;
        Ok(steps.finish(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_normalize_mixed_case_and_hex_ints() {
        let wallet: Address = WALLET.parse().unwrap();
        let tx = json!({
            "from": WALLET.to_lowercase(),
            "to": "0X2C7536E3605D9C16A7A3D7B1898E529396A65C23".to_lowercase(),
            "value": "0x0de0b6b3a7640000",
            "data": "0xabcdef",
            "gas": 250000,
            "gasPrice": "1000000000",
            "nonce": 7
        });
        let call = normalize_assembled_tx("http://api", &tx, wallet).unwrap();
        assert_eq!(call.value, U256::exp10(18));
        assert_eq!(call.data, Bytes::from(vec![0xab, 0xcd, 0xef]));
        assert_eq!(call.gas, Some(U256::from(250_000)));
        assert_eq!(call.gas_price, Some(U256::exp10(9)));
        assert_eq!(call.nonce, None);
    }

    #[test]
    fn test_normalize_rejects_foreign_sender() {
        let wallet: Address = WALLET.parse().unwrap();
        let tx = json!({
            "from": "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "to": "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        });
        assert!(normalize_assembled_tx("http://api", &tx, wallet).is_err());
        assert!(normalize_assembled_tx("http://api", &json!({}), wallet).is_err());
    }

    #[test]
    fn test_method_defaults_to_post() {
        let req: ApiRequest = serde_json::from_value(json!({"url": "http://q"})).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        let req: ApiRequest =
            serde_json::from_value(json!({"url": "http://q", "method": "GET"})).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
    }
}
