//! Token suppliers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthError;

/// Produces bearer tokens on demand.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A fixed token. Refreshing it is a no-op round trip.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Adapts an async closure into a [`TokenSource`].
pub struct FnTokenSource<F> {
    f: F,
}

impl<F> FnTokenSource<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TokenSource for FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, AuthError>> + Send + 'static,
{
    async fn access_token(&self) -> Result<String, AuthError> {
        (self.f)().await
    }
}

/// Shorthand for `Arc::new(FnTokenSource::new(f))`.
///
/// ```rust
/// use authrpc_core::auth::token_fn;
///
/// let source = token_fn(|| async { Ok("secret".to_string()) });
/// ```
pub fn token_fn<F, Fut>(f: F) -> Arc<dyn TokenSource>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, AuthError>> + Send + 'static,
{
    Arc::new(FnTokenSource::new(f))
}
