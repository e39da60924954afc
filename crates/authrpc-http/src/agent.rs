//! Keep-alive connection agents.
//!
//! One reqwest client is built per provider and shared by every request;
//! its connection pool is the keep-alive agent.

use std::time::Duration;

use authrpc_core::error::ProviderError;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Which agent a host gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Http,
    Https,
}

impl AgentKind {
    /// Case-sensitive prefix check: `"https..."` → HTTPS, anything else → HTTP.
    pub fn for_host(host: &str) -> Self {
        if host.starts_with("https") {
            Self::Https
        } else {
            Self::Http
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// A pooled HTTP or HTTPS client.
#[derive(Debug, Clone)]
pub struct ConnectionAgent {
    kind: AgentKind,
    client: reqwest::Client,
}

impl ConnectionAgent {
    /// Build the agent for `host`.
    ///
    /// With `keep_alive` off, idle connections are not pooled, so every
    /// request opens a fresh socket. `with_credentials` enables a cookie
    /// store so cookies set by the node are sent back.
    pub fn for_host(
        host: &str,
        keep_alive: bool,
        with_credentials: bool,
    ) -> Result<Self, ProviderError> {
        let kind = AgentKind::for_host(host);
        let mut builder = reqwest::Client::builder().cookie_store(with_credentials);

        builder = if keep_alive {
            builder
                .pool_idle_timeout(POOL_IDLE_TIMEOUT)
                .tcp_keepalive(TCP_KEEPALIVE)
        } else {
            builder.pool_max_idle_per_host(0)
        };

        if kind == AgentKind::Https {
            builder = builder.https_only(true);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build {kind} agent: {e}")))?;

        tracing::debug!(%kind, keep_alive, with_credentials, "connection agent created");
        Ok(Self { kind, client })
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
