//! `HttpProvider` — JSON-RPC over HTTP(S) with bearer-token refresh.
//!
//! Lifecycle:
//! ```text
//! connect → initial auth sync → [ready] → send(payload, callback)
//!                                           → freshness check (may refresh)
//!                                           → POST host
//!                                           → callback(outcome)
//!        concurrently: RefreshLoop → sync → reschedule
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use authrpc_core::auth::{AuthSession, AuthStatus, RefreshLoop};
use authrpc_core::error::ProviderError;
use authrpc_core::headers::HeaderSet;
use authrpc_core::transport::{
    HealthStatus, HttpRequest, HttpResponse, HttpTransport, RpcProvider, TransportFailure,
};

use crate::agent::ConnectionAgent;
use crate::client::ReqwestTransport;
use crate::options::{ProviderOptions, DEFAULT_HOST};

const CONN_UNKNOWN: u8 = 0;
const CONN_UP: u8 = 1;
const CONN_DOWN: u8 = 2;

struct Inner {
    host: String,
    timeout: Duration,
    with_credentials: bool,
    transport: Arc<dyn HttpTransport>,
    session: Arc<AuthSession>,
    refresh: Option<RefreshLoop>,
    connection: AtomicU8,
}

/// HTTP JSON-RPC provider.
///
/// Cheap to clone; clones share configuration, auth state and the
/// connection state. The background refresh loop stops when
/// [`disconnect`](RpcProvider::disconnect) is called or the last clone is
/// dropped.
#[derive(Clone)]
pub struct HttpProvider {
    inner: Arc<Inner>,
}

impl HttpProvider {
    /// Build a provider for `host` (default `http://localhost:8545`) and
    /// run the initial authentication sync.
    ///
    /// A failing token source does not fail construction; the refresh loop
    /// keeps retrying in the background.
    pub async fn connect(host: Option<&str>, options: ProviderOptions) -> Result<Self, ProviderError> {
        let host = resolve_host(host);
        let transport = match options.agent.clone() {
            Some(agent) => ReqwestTransport::from_custom(agent)?,
            None => ReqwestTransport::from_agent(ConnectionAgent::for_host(
                &host,
                options.keep_alive,
                options.with_credentials,
            )?),
        };
        Ok(Self::with_transport(host, options, Arc::new(transport)).await)
    }

    /// Like [`connect`](Self::connect) but sending through `transport`.
    pub async fn with_transport(
        host: impl Into<String>,
        options: ProviderOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let host: String = host.into();
        let host = resolve_host(Some(host.as_str()));
        let headers: HeaderSet = options.headers.iter().cloned().collect();
        let session = Arc::new(AuthSession::new(options.token_source.clone(), headers));

        let refresh = if session.is_enabled() {
            let status = session.sync().await;
            if status != AuthStatus::Authenticated {
                tracing::warn!(url = %host, "initial token sync failed, provider usable without auth");
            }
            Some(RefreshLoop::spawn(
                session.clone(),
                options.effective_sync_interval(),
                options.effective_refresh_backoff(),
                status,
            ))
        } else {
            None
        };

        tracing::debug!(
            url = %host,
            auth = session.is_enabled(),
            timeout_ms = options.timeout.as_millis() as u64,
            "http provider ready"
        );

        Self {
            inner: Arc::new(Inner {
                host,
                timeout: options.timeout,
                with_credentials: options.with_credentials,
                transport,
                session,
                refresh,
                connection: AtomicU8::new(CONN_UNKNOWN),
            }),
        }
    }

    /// Fire-and-forget send. `callback` runs exactly once with the outcome.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send<F>(&self, payload: Value, callback: F)
    where
        F: FnOnce(Result<Value, ProviderError>) + Send + 'static,
    {
        let provider = self.clone();
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(provider.request(payload)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    provider.set_connected(false);
                    tracing::warn!(url = %provider.inner.host, "transport panicked during send");
                    Err(ProviderError::invalid_connection(&provider.inner.host))
                }
            };
            callback(outcome);
        });
    }

    /// Last-known transport health: `true` after a response was received.
    pub fn is_connected(&self) -> bool {
        self.inner.connection.load(Ordering::Acquire) == CONN_UP
    }

    pub fn auth_status(&self) -> AuthStatus {
        self.inner.session.status()
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner.session.current_token()
    }

    /// Headers the next request will carry (besides `Content-Type`).
    pub fn headers(&self) -> HeaderSet {
        self.inner.session.headers()
    }

    /// `true` while the background token refresh loop is alive.
    pub fn has_refresh_task(&self) -> bool {
        self.inner
            .refresh
            .as_ref()
            .is_some_and(RefreshLoop::is_running)
    }

    fn set_connected(&self, up: bool) {
        let state = if up { CONN_UP } else { CONN_DOWN };
        self.inner.connection.store(state, Ordering::Release);
    }

    async fn dispatch(&self, payload: Value) -> Result<Value, ProviderError> {
        let inner = &self.inner;
        inner.session.ensure_fresh().await;

        let body = serde_json::to_string(&payload).map_err(|e| {
            tracing::warn!(url = %inner.host, error = %e, "payload serialization failed");
            self.set_connected(false);
            ProviderError::invalid_connection(&inner.host)
        })?;

        let req = HttpRequest::post_json(&inner.host, body)
            .with_headers(&inner.session.headers())
            .with_timeout(inner.timeout)
            .with_credentials(inner.with_credentials);

        let outcome = if inner.timeout.is_zero() {
            inner.transport.post(req).await
        } else {
            tokio::time::timeout(inner.timeout, inner.transport.post(req))
                .await
                .unwrap_or(Err(TransportFailure::Timeout))
        };

        match outcome {
            Ok(resp) => self.on_response(resp),
            Err(TransportFailure::Timeout) => {
                self.set_connected(false);
                let ms = timeout_ms(inner.timeout);
                tracing::warn!(url = %inner.host, timeout_ms = ms, "request timed out");
                Err(ProviderError::connection_timeout(ms))
            }
            Err(TransportFailure::Connect(reason)) => {
                self.set_connected(false);
                tracing::warn!(url = %inner.host, error = %reason, "request could not be sent");
                Err(ProviderError::invalid_connection(&inner.host))
            }
        }
    }

    fn on_response(&self, resp: HttpResponse) -> Result<Value, ProviderError> {
        // The node answered, whatever the status.
        self.set_connected(true);

        if !resp.is_success() {
            tracing::debug!(url = %self.inner.host, status = resp.status, "non-2xx response");
            return Err(ProviderError::HttpStatus {
                status: resp.status,
                body: resp.body,
            });
        }

        serde_json::from_str(&resp.body).map_err(|_| ProviderError::invalid_response(resp.body))
    }
}

#[async_trait]
impl RpcProvider for HttpProvider {
    async fn request(&self, payload: Value) -> Result<Value, ProviderError> {
        self.dispatch(payload).await
    }

    /// Stops the token refresh loop. Requests keep working.
    fn disconnect(&self) {
        if let Some(refresh) = &self.inner.refresh {
            refresh.cancel();
        }
    }

    fn supports_subscriptions(&self) -> bool {
        false
    }

    fn health(&self) -> HealthStatus {
        match self.inner.connection.load(Ordering::Acquire) {
            CONN_UP => HealthStatus::Healthy,
            CONN_DOWN => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }

    fn host(&self) -> &str {
        &self.inner.host
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("host", &self.inner.host)
            .field("timeout", &self.inner.timeout)
            .field("auth", &self.inner.session.status())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Whole milliseconds, rounded up so a sub-millisecond timeout never reports 0.
fn timeout_ms(timeout: Duration) -> u64 {
    let ms = timeout.as_millis() as u64;
    if Duration::from_millis(ms) < timeout {
        ms + 1
    } else {
        ms
    }
}

fn resolve_host(host: Option<&str>) -> String {
    match host {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => DEFAULT_HOST.to_string(),
    }
}
