//! Shared authentication state with single-flight refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::auth::jwt;
use crate::auth::source::TokenSource;
use crate::error::AuthError;
use crate::headers::{Header, HeaderSet};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No token source configured. Permanent.
    Disabled,
    /// No token obtained yet, or the last refresh failed without one.
    Unauthenticated,
    /// A token is installed.
    Authenticated,
    /// A token fetch is in flight.
    Refreshing,
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Refreshing => write!(f, "refreshing"),
        }
    }
}

#[derive(Default)]
struct AuthState {
    token: Option<String>,
    last_outcome: Option<Result<(), AuthError>>,
}

/// Token, header set and refresh guard for one provider.
///
/// The header set and token are behind std locks that are never held across
/// an await. Refreshes are serialized by an async mutex; a caller that had
/// to wait for someone else's refresh returns that refresh's outcome
/// instead of fetching again.
pub struct AuthSession {
    source: Option<Arc<dyn TokenSource>>,
    headers: RwLock<HeaderSet>,
    state: Mutex<AuthState>,
    refresh_guard: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    refreshed: Notify,
}

impl AuthSession {
    pub fn new(source: Option<Arc<dyn TokenSource>>, headers: HeaderSet) -> Self {
        Self {
            source,
            headers: RwLock::new(headers),
            state: Mutex::new(AuthState::default()),
            refresh_guard: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            refreshed: Notify::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    pub fn status(&self) -> AuthStatus {
        if self.source.is_none() {
            return AuthStatus::Disabled;
        }
        if self.refresh_guard.try_lock().is_err() {
            return AuthStatus::Refreshing;
        }
        match self.lock_state().token {
            Some(_) => AuthStatus::Authenticated,
            None => AuthStatus::Unauthenticated,
        }
    }

    pub fn current_token(&self) -> Option<String> {
        self.lock_state().token.clone()
    }

    /// `true` if the most recent refresh attempt failed.
    pub fn last_refresh_failed(&self) -> bool {
        matches!(self.lock_state().last_outcome, Some(Err(_)))
    }

    /// Snapshot of the headers to attach to the next request.
    pub fn headers(&self) -> HeaderSet {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves the next time a refresh succeeds.
    pub fn refreshed(&self) -> Notified<'_> {
        self.refreshed.notified()
    }

    /// Refresh if enabled, absorbing failures. Returns the resulting status.
    pub async fn sync(&self) -> AuthStatus {
        if !self.is_enabled() {
            return AuthStatus::Disabled;
        }
        match self.refresh().await {
            Ok(()) => AuthStatus::Authenticated,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                AuthStatus::Unauthenticated
            }
        }
    }

    /// Fetch a new token and install it as `Authorization: Bearer <token>`.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let Some(source) = self.source.as_ref() else {
            return Err(AuthError::Disabled);
        };

        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_guard.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            tracing::trace!("joined in-flight token refresh");
            return self.lock_state().last_outcome.clone().unwrap_or(Ok(()));
        }

        let outcome = source.access_token().await.map(|token| self.install(token));

        self.lock_state().last_outcome = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::Release);
        if outcome.is_ok() {
            tracing::debug!("access token refreshed");
            self.refreshed.notify_waiters();
        }
        outcome
    }

    /// Force a refresh if the current token is a JWT whose `exp` has passed.
    ///
    /// Failures are logged; the caller proceeds with whatever headers exist.
    pub async fn ensure_fresh(&self) {
        let expired = self
            .lock_state()
            .token
            .as_deref()
            .is_some_and(jwt::is_expired);
        if !expired {
            return;
        }

        tracing::debug!("access token expired, refreshing before send");
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "forced token refresh failed");
        }
    }

    fn install(&self, token: String) {
        self.headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Header::bearer(&token));
        self.lock_state().token = Some(token);
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("status", &self.status())
            .field("headers", &self.headers().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::source::{token_fn, StaticToken};
    use crate::headers::AUTHORIZATION;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn counting_source(calls: Arc<AtomicU32>) -> Arc<dyn TokenSource> {
        token_fn(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(format!("tok{n}"))
            }
        })
    }

    fn jwt_with_exp(exp: u64) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#))
        )
    }

    #[tokio::test]
    async fn disabled_session() {
        let session = AuthSession::new(None, HeaderSet::new());
        assert_eq!(session.status(), AuthStatus::Disabled);
        assert_eq!(session.sync().await, AuthStatus::Disabled);
        assert_eq!(session.refresh().await, Err(AuthError::Disabled));
        assert!(session.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn refresh_installs_single_bearer_header() {
        let mut headers = HeaderSet::new();
        headers.insert(Header::new("X-Client", "authrpc"));
        let calls = Arc::new(AtomicU32::new(0));
        let session = AuthSession::new(Some(counting_source(calls)), headers);
        assert_eq!(session.status(), AuthStatus::Unauthenticated);

        for _ in 0..3 {
            session.refresh().await.unwrap();
        }

        let headers = session.headers();
        assert_eq!(headers.count(AUTHORIZATION), 1);
        assert_eq!(headers.get(AUTHORIZATION), Some("Bearer tok3"));
        assert_eq!(headers.get("X-Client"), Some("authrpc"));
        assert_eq!(session.current_token().as_deref(), Some("tok3"));
        assert_eq!(session.status(), AuthStatus::Authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let session = AuthSession::new(Some(counting_source(calls.clone())), HeaderSet::new());

        let results = futures::future::join_all((0..5).map(|_| session.refresh())).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.headers().get(AUTHORIZATION), Some("Bearer tok1"));
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_share_a_failed_outcome() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let source = token_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(AuthError::Refresh("token endpoint down".into()))
            }
        });
        let session = AuthSession::new(Some(source), HeaderSet::new());

        let results = futures::future::join_all((0..3).map(|_| session.refresh())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(Result::is_err));
        assert!(session.last_refresh_failed());
        assert_eq!(session.sync().await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let source = token_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("first".to_string())
                } else {
                    Err(AuthError::Refresh("boom".into()))
                }
            }
        });
        let session = AuthSession::new(Some(source), HeaderSet::new());

        session.refresh().await.unwrap();
        assert!(session.refresh().await.is_err());
        assert_eq!(session.headers().get(AUTHORIZATION), Some("Bearer first"));
        assert_eq!(session.status(), AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn expired_jwt_forces_refresh() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let source = token_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(jwt_with_exp(if n == 0 { 1 } else { 4_102_444_800 })) }
        });
        let session = AuthSession::new(Some(source), HeaderSet::new());
        session.refresh().await.unwrap();

        session.ensure_fresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The replacement is valid, so no further refresh happens.
        session.ensure_fresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            session.current_token(),
            Some(jwt_with_exp(4_102_444_800))
        );
    }

    #[tokio::test]
    async fn opaque_token_skips_freshness_check() {
        let session = AuthSession::new(Some(Arc::new(StaticToken::new("opaque"))), HeaderSet::new());
        session.refresh().await.unwrap();
        let before = session.generation.load(Ordering::Acquire);
        session.ensure_fresh().await;
        assert_eq!(session.generation.load(Ordering::Acquire), before);
    }
}
