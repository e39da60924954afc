//! Transport and provider traits.
//!
//! [`HttpTransport`] is the injected capability that actually moves bytes
//! (a reqwest client in production, an in-memory mock in tests).
//! [`RpcProvider`] is what callers program against.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::headers::{Header, HeaderSet};
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A prepared `POST` request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderSet,
    pub body: String,
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
    pub with_credentials: bool,
}

impl HttpRequest {
    /// A JSON `POST` to `url` with `Content-Type: application/json` set.
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut headers = HeaderSet::new();
        headers.insert(Header::new("Content-Type", "application/json"));
        Self {
            url: url.into(),
            headers,
            body: body.into(),
            timeout: None,
            with_credentials: false,
        }
    }

    /// Apply configured headers after `Content-Type`, in order.
    pub fn with_headers(mut self, headers: &HeaderSet) -> Self {
        for header in headers {
            self.headers.insert(header.clone());
        }
        self
    }

    /// `Duration::ZERO` disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }
}

/// A fully received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a transport produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,

    /// Refused, unreachable, DNS failure, TLS failure...
    #[error("connection failed: {0}")]
    Connect(String),
}

/// The HTTP capability a provider sends through.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn post(&self, req: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Provider health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Last request reached the node.
    Healthy,
    /// Last request timed out or could not connect.
    Unhealthy,
    /// Nothing has been sent yet.
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A JSON-RPC provider.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// Everything except [`call`](RpcProvider::call) is object-safe, so the
/// trait can be stored as `Arc<dyn RpcProvider>`.
#[async_trait]
pub trait RpcProvider: Send + Sync + 'static {
    /// Send one payload and return the parsed JSON response body.
    async fn request(&self, payload: Value) -> Result<Value, ProviderError>;

    /// Release background resources. Subsequent requests still work.
    fn disconnect(&self);

    /// Push-style subscriptions need a different transport.
    fn supports_subscriptions(&self) -> bool {
        false
    }

    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// The node URL this provider targets.
    fn host(&self) -> &str;

    /// Convenience: call a method and deserialize the result.
    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ProviderError>
    where
        Self: Sized,
    {
        let req = JsonRpcRequest::new(id, method, params);
        let body = self.request(req.to_value()).await?;
        let result = JsonRpcResponse::from_value(body)?.into_result()?;
        serde_json::from_value(result).map_err(ProviderError::Deserialization)
    }
}
