//! `HttpTransport` backed by `reqwest`.
//!
//! Responsibilities:
//! - pick the HTTP or HTTPS client for the request URL
//! - resolve relative hosts against a custom agent's `base_url`
//! - map reqwest failures onto [`TransportFailure`]
//!
//! Status codes and body parsing are left to the provider.

use async_trait::async_trait;
use url::Url;

use authrpc_core::error::ProviderError;
use authrpc_core::transport::{HttpRequest, HttpResponse, HttpTransport, TransportFailure};

use crate::agent::{AgentKind, ConnectionAgent};
use crate::options::CustomAgent;

/// reqwest-based transport.
///
/// Cookie handling (`with_credentials`) is a property of the client it was
/// built with; the per-request flag is informational here.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Option<reqwest::Client>,
    https: Option<reqwest::Client>,
    base_url: Option<Url>,
}

impl ReqwestTransport {
    /// Use a built-in agent.
    pub fn from_agent(agent: ConnectionAgent) -> Self {
        let client = agent.client().clone();
        let (http, https) = match agent.kind() {
            AgentKind::Http => (Some(client), None),
            AgentKind::Https => (None, Some(client)),
        };
        Self {
            http,
            https,
            base_url: None,
        }
    }

    /// Use caller-supplied clients. A missing slot falls back to the other
    /// one; if both are missing a default client is built.
    pub fn from_custom(agent: CustomAgent) -> Result<Self, ProviderError> {
        let base_url = agent
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ProviderError::Config(format!("invalid agent base URL: {e}")))?;

        let http = match (agent.http, agent.https.is_none()) {
            (None, true) => Some(
                reqwest::Client::builder()
                    .build()
                    .map_err(|e| ProviderError::Config(format!("failed to build client: {e}")))?,
            ),
            (http, _) => http,
        };

        Ok(Self {
            http,
            https: agent.https,
            base_url,
        })
    }

    fn resolve(&self, raw: &str) -> Result<Url, TransportFailure> {
        match (Url::parse(raw), &self.base_url) {
            (Ok(url), _) => Ok(url),
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base
                .join(raw)
                .map_err(|e| TransportFailure::Connect(format!("invalid URL {raw}: {e}"))),
            (Err(e), _) => Err(TransportFailure::Connect(format!("invalid URL {raw}: {e}"))),
        }
    }

    fn client_for(&self, url: &Url) -> Option<&reqwest::Client> {
        if url.scheme() == "https" {
            self.https.as_ref().or(self.http.as_ref())
        } else {
            self.http.as_ref().or(self.https.as_ref())
        }
    }
}

fn classify(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Connect(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, req: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let url = self.resolve(&req.url)?;
        let client = self
            .client_for(&url)
            .ok_or_else(|| TransportFailure::Connect("no agent for URL scheme".into()))?;

        let mut builder = client.post(url).body(req.body);
        for header in &req.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;

        Ok(HttpResponse { status, body })
    }
}
