//! authrpc-core — foundation traits and types for authrpc.
//!
//! # Overview
//!
//! authrpc sends JSON-RPC payloads over HTTP(S) to a node that may sit
//! behind bearer-token authentication. The core crate defines:
//!
//! - [`HttpTransport`] — the injected capability that performs a `POST`
//! - [`RpcProvider`] — the async trait callers program against
//! - [`ProviderError`] / [`AuthError`] — structured error types
//! - [`HeaderSet`] — ordered headers with a single `Authorization` entry
//! - [`auth`] module — token sources, single-flight refresh, refresh loop
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types for typed calls

pub mod auth;
pub mod error;
pub mod headers;
pub mod request;
pub mod transport;

pub use auth::{AuthSession, AuthStatus, RefreshLoop, StaticToken, TokenSource};
pub use error::{AuthError, ProviderError};
pub use headers::{Header, HeaderSet, AUTHORIZATION};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{
    HealthStatus, HttpRequest, HttpResponse, HttpTransport, RpcProvider, TransportFailure,
};
