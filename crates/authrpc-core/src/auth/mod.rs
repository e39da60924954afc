//! Bearer-token authentication.
//!
//! ```text
//! TokenSource ──fetch──▶ AuthSession ──upsert──▶ HeaderSet
//!                             ▲
//!            RefreshLoop ─────┘ (every sync_interval, backoff on failure)
//! ```
//!
//! A refresh can be driven by the background [`RefreshLoop`] or forced by a
//! request that finds its JWT expired. Both go through the same
//! single-flight guard in [`AuthSession::refresh`].

pub mod jwt;
pub mod refresh;
pub mod session;
pub mod source;

pub use refresh::RefreshLoop;
pub use session::{AuthSession, AuthStatus};
pub use source::{token_fn, FnTokenSource, StaticToken, TokenSource};
