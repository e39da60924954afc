//! JSON-RPC 2.0 wire types used by the typed `call` helper.
//!
//! The provider itself is payload-agnostic; these types only shape the
//! convenience layer on top of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }

    /// Render as the untyped payload the provider sends.
    pub fn to_value(&self) -> Value {
        // A struct of strings, numbers and `Value`s always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Interpret a parsed response body.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        serde_json::from_value(value).map_err(ProviderError::Deserialization)
    }

    /// Returns the `result` member, or the node's error object as
    /// [`ProviderError::Rpc`].
    pub fn into_result(self) -> Result<Value, ProviderError> {
        match self.error {
            Some(err) => Err(ProviderError::Rpc(err)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
