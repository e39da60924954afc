//! Provider configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use authrpc_http::ProviderOptions;
//!
//! let options = ProviderOptions::new()
//!     .timeout(Duration::from_secs(20))
//!     .header("X-Client", "indexer")
//!     .access_token(|| async { Ok("secret".to_string()) })
//!     .sync_interval(Duration::from_secs(300));
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use authrpc_core::auth::{token_fn, TokenSource};
use authrpc_core::error::AuthError;
use authrpc_core::headers::{Header, HeaderSet};

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "http://localhost:8545";
/// Interval between background token refreshes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);
/// Delay before retrying a failed token refresh.
pub const DEFAULT_REFRESH_BACKOFF: Duration = Duration::from_secs(10);

/// Caller-supplied reqwest clients, used instead of the built-in agents.
///
/// `base_url` resolves relative `host` values.
#[derive(Debug, Clone, Default)]
pub struct CustomAgent {
    pub http: Option<reqwest::Client>,
    pub https: Option<reqwest::Client>,
    pub base_url: Option<String>,
}

/// Options for [`HttpProvider`](crate::HttpProvider).
///
/// Plain fields deserialize from the camelCase JSON option bag
/// (`withCredentials`, `timeout`, `headers`, `keepAlive`, `syncInterval`,
/// `refreshBackoff`; durations in milliseconds). The agent and the token
/// source can only be set in code.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderOptions {
    pub with_credentials: bool,
    /// `Duration::ZERO` disables the timeout.
    #[serde(deserialize_with = "millis")]
    pub timeout: Duration,
    pub headers: HeaderSet,
    #[serde(skip)]
    pub agent: Option<CustomAgent>,
    pub keep_alive: bool,
    /// `None` disables authentication entirely.
    #[serde(skip)]
    pub token_source: Option<Arc<dyn TokenSource>>,
    #[serde(deserialize_with = "millis")]
    pub sync_interval: Duration,
    #[serde(deserialize_with = "millis")]
    pub refresh_backoff: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            with_credentials: false,
            timeout: Duration::ZERO,
            headers: HeaderSet::new(),
            agent: None,
            keep_alive: true,
            token_source: None,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            refresh_backoff: DEFAULT_REFRESH_BACKOFF,
        }
    }
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add one custom header (replacing any existing one of that name).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(Header::new(name, value));
        self
    }

    pub fn headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    pub fn agent(mut self, agent: CustomAgent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    /// Use an async closure as the token source.
    pub fn access_token<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AuthError>> + Send + 'static,
    {
        self.token_source(token_fn(f))
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn refresh_backoff(mut self, backoff: Duration) -> Self {
        self.refresh_backoff = backoff;
        self
    }

    /// Refresh interval with zero mapped to the default.
    pub(crate) fn effective_sync_interval(&self) -> Duration {
        non_zero_or(self.sync_interval, DEFAULT_SYNC_INTERVAL)
    }

    pub(crate) fn effective_refresh_backoff(&self) -> Duration {
        non_zero_or(self.refresh_backoff, DEFAULT_REFRESH_BACKOFF)
    }
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("with_credentials", &self.with_credentials)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers.len())
            .field("agent", &self.agent.is_some())
            .field("keep_alive", &self.keep_alive)
            .field("auth", &self.token_source.is_some())
            .field("sync_interval", &self.sync_interval)
            .field("refresh_backoff", &self.refresh_backoff)
            .finish()
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authrpc_core::headers::AUTHORIZATION;

    #[test]
    fn defaults() {
        let opts = ProviderOptions::default();
        assert!(!opts.with_credentials);
        assert!(opts.timeout.is_zero());
        assert!(opts.headers.is_empty());
        assert!(opts.keep_alive);
        assert!(opts.token_source.is_none());
        assert_eq!(opts.sync_interval, Duration::from_millis(60_000));
        assert_eq!(opts.refresh_backoff, Duration::from_secs(10));
    }

    #[test]
    fn from_json_option_bag() {
        let opts: ProviderOptions = serde_json::from_str(
            r#"{
                "withCredentials": true,
                "timeout": 2500,
                "headers": [{"name": "X-Api-Key", "value": "k"}],
                "keepAlive": false,
                "syncInterval": 50
            }"#,
        )
        .unwrap();

        assert!(opts.with_credentials);
        assert_eq!(opts.timeout, Duration::from_millis(2500));
        assert_eq!(opts.headers.get("X-Api-Key"), Some("k"));
        assert!(!opts.keep_alive);
        assert_eq!(opts.sync_interval, Duration::from_millis(50));
        assert_eq!(opts.refresh_backoff, DEFAULT_REFRESH_BACKOFF);
    }

    #[test]
    fn json_headers_keep_one_authorization() {
        let opts: ProviderOptions = serde_json::from_str(
            r#"{"headers":[{"name":"Authorization","value":"a"},{"name":"authorization","value":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(opts.headers.count(AUTHORIZATION), 1);
        assert_eq!(opts.headers.get(AUTHORIZATION), Some("b"));
    }

    #[test]
    fn zero_intervals_fall_back() {
        let opts = ProviderOptions::new()
            .sync_interval(Duration::ZERO)
            .refresh_backoff(Duration::ZERO);
        assert_eq!(opts.effective_sync_interval(), DEFAULT_SYNC_INTERVAL);
        assert_eq!(opts.effective_refresh_backoff(), DEFAULT_REFRESH_BACKOFF);
    }

    #[test]
    fn fluent_setters() {
        let opts = ProviderOptions::new()
            .header("X-A", "1")
            .header("x-a", "2")
            .access_token(|| async { Ok("t".to_string()) })
            .keep_alive(false);
        assert_eq!(opts.headers.len(), 1);
        assert_eq!(opts.headers.get("X-A"), Some("2"));
        assert!(opts.token_source.is_some());
        assert!(!opts.keep_alive);
    }
}
