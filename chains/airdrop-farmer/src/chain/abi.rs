//! Binding catalog JSON arguments onto ABI functions.

use ethers::abi::{Abi, Function, ParamType, Token};
use ethers::types::{Address, Bytes, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ChainError;

/// Arguments of a contract call, by parameter name or by position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CallArgs {
    Keyword(Map<String, Value>),
    Positional(Vec<Value>),
}

impl Default for CallArgs {
    fn default() -> Self {
        CallArgs::Keyword(Map::new())
    }
}

impl CallArgs {
    fn len(&self) -> usize {
        match self {
            CallArgs::Keyword(map) => map.len(),
            CallArgs::Positional(list) => list.len(),
        }
    }
}

/// Accepts an ABI inline (JSON array) or as a JSON-encoded string.
pub fn parse_abi(value: &Value) -> Result<Abi, ChainError> {
    match value {
        Value::String(raw) => serde_json::from_str(raw).map_err(ChainError::abi),
        other => serde_json::from_value(other.clone()).map_err(ChainError::abi),
    }
}

/// Picks the overload of `name` matching the arguments and binds them.
///
/// Keyword arguments must name every input exactly; positional ones must
/// match the input count. The first overload that also type-checks wins.
pub fn bind_function<'a>(
    abi: &'a Abi,
    name: &str,
    args: &CallArgs,
) -> Result<(&'a Function, Vec<Token>), ChainError> {
    let overloads = abi
        .functions_by_name(name)
        .map_err(|_| ChainError::Abi(format!("function '{}' not found in ABI", name)))?;

    let mut last_error = None;
    for function in overloads.iter().filter(|f| f.inputs.len() == args.len()) {
        match bind_args(function, args) {
            Ok(tokens) => return Ok((function, tokens)),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ChainError::Abi(format!(
            "no overload of '{}' takes {} arguments",
            name,
            args.len()
        ))
    }))
}

fn bind_args(function: &Function, args: &CallArgs) -> Result<Vec<Token>, ChainError> {
    function
        .inputs
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let value = match args {
                CallArgs::Keyword(map) => map.get(&param.name).ok_or_else(|| {
                    ChainError::Abi(format!(
                        "{}: missing argument '{}'",
                        function.name, param.name
                    ))
                })?,
                CallArgs::Positional(list) => &list[i],
            };
            json_to_token(&param.kind, value).map_err(|reason| ChainError::InvalidArgument {
                field: if param.name.is_empty() {
                    format!("{}[{}]", function.name, i)
                } else {
                    format!("{}.{}", function.name, param.name)
                },
                reason,
            })
        })
        .collect()
}

pub fn encode_call(function: &Function, tokens: &[Token]) -> Result<Bytes, ChainError> {
    function
        .encode_input(tokens)
        .map(Bytes::from)
        .map_err(ChainError::abi)
}

pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<Token>, ChainError> {
    function.decode_output(data).map_err(ChainError::abi)
}

/// Reads an integer from a JSON number, a decimal string or a `0x` hex string.
pub fn parse_u256(value: &Value) -> Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("{} is not an unsigned integer (quote large values)", n)),
        Value::String(s) => parse_u256_str(s),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

pub fn parse_u256_str(raw: &str) -> Result<U256, String> {
    let s = raw.trim().trim_matches('"');
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("'{}': {}", raw, e)),
        None => U256::from_dec_str(s).map_err(|e| format!("'{}': {}", raw, e)),
    }
}

fn parse_hex_bytes(value: &Value) -> Result<Vec<u8>, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected a hex string, got {}", value))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| format!("'{}': {}", s, e))
}

fn expect_array<'v>(value: &'v Value, len: Option<usize>) -> Result<&'v Vec<Value>, String> {
    let list = value
        .as_array()
        .ok_or_else(|| format!("expected an array, got {}", value))?;
    if let Some(len) = len {
        if list.len() != len {
            return Err(format!("expected {} elements, got {}", len, list.len()));
        }
    }
    Ok(list)
}

/// Converts one JSON value to an ABI token of the given type.
pub fn json_to_token(kind: &ParamType, value: &Value) -> Result<Token, String> {
    match kind {
        ParamType::Address => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("expected an address, got {}", value))?;
            s.trim_matches('"')
                .parse::<Address>()
                .map(Token::Address)
                .map_err(|_| format!("'{}' is not an address", s))
        }
        ParamType::Uint(_) => parse_u256(value).map(Token::Uint),
        ParamType::Int(_) => {
            let int = match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(I256::from)
                    .ok_or_else(|| format!("{} is not an integer", n))?,
                Value::String(s) => {
                    I256::from_dec_str(s.trim()).map_err(|e| format!("'{}': {}", s, e))?
                }
                other => return Err(format!("expected an integer, got {}", other)),
            };
            Ok(Token::Int(int.into_raw()))
        }
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Token::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Token::Bool(false)),
            other => Err(format!("expected a boolean, got {}", other)),
        },
        ParamType::String => value
            .as_str()
            .map(|s| Token::String(s.to_string()))
            .ok_or_else(|| format!("expected a string, got {}", value)),
        ParamType::Bytes => parse_hex_bytes(value).map(Token::Bytes),
        ParamType::FixedBytes(size) => {
            let bytes = parse_hex_bytes(value)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => expect_array(value, None)?
            .iter()
            .map(|v| json_to_token(inner, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Token::Array),
        ParamType::FixedArray(inner, len) => expect_array(value, Some(*len))?
            .iter()
            .map(|v| json_to_token(inner, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Token::FixedArray),
        ParamType::Tuple(kinds) => expect_array(value, Some(kinds.len()))?
            .iter()
            .zip(kinds)
            .map(|(v, k)| json_to_token(k, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Token::Tuple),
    }
}
