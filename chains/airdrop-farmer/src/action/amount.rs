//! Serde helpers for wei amounts and numeric ids.
//!
//! Catalog files write amounts as JSON numbers when they fit in a u64 and
//! as decimal or `0x` strings otherwise. Amounts are serialized back as
//! decimal strings.

use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::chain::abi::parse_u256;

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_u256(&value).map_err(serde::de::Error::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => parse_u256(&value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Discord snowflakes and tweet ids, given as a number or a string.
pub mod id {
    use super::*;

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected an id, got {}",
                other
            ))),
        }
    }
}
