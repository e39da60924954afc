//! Provider- and auth-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors delivered to `send` callers and returned from construction.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A 2xx response arrived but its body is not valid JSON.
    #[error("Invalid JSON RPC response: {body:?}")]
    InvalidResponse { body: String },

    /// No response within the configured timeout.
    #[error("CONNECTION TIMEOUT: timeout of {ms} ms achieved")]
    ConnectionTimeout { ms: u64 },

    /// The request could not be dispatched at all.
    #[error("CONNECTION ERROR: Couldn't connect to node {host}.")]
    InvalidConnection { host: String },

    /// The node answered with a status outside 2xx.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// JSON-RPC error object returned by the node (typed `call` only).
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Response could not be deserialized into the requested type.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The provider could not be built from its options.
    #[error("Invalid provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn invalid_response(body: impl Into<String>) -> Self {
        Self::InvalidResponse { body: body.into() }
    }

    pub fn connection_timeout(ms: u64) -> Self {
        Self::ConnectionTimeout { ms }
    }

    pub fn invalid_connection(host: impl Into<String>) -> Self {
        Self::InvalidConnection { host: host.into() }
    }

    /// Returns `true` if a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. } | Self::InvalidConnection { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised by the token layer. Never surfaced through `send`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token source failed to produce a token.
    #[error("Cannot get a new access token: {0}")]
    Refresh(String),

    /// No token source is configured.
    #[error("Authentication is disabled")]
    Disabled,
}
