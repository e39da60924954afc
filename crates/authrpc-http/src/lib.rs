//! authrpc-http — JSON-RPC over HTTP(S) with bearer-token authentication.
//!
//! # Quick start
//! ```rust,no_run
//! use std::time::Duration;
//! use authrpc_core::RpcProvider;
//! use authrpc_http::{HttpProvider, ProviderOptions};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), authrpc_core::ProviderError> {
//! let provider = HttpProvider::connect(
//!     Some("https://node.example.com"),
//!     ProviderOptions::new()
//!         .timeout(Duration::from_secs(10))
//!         .access_token(|| async { Ok("secret".to_string()) }),
//! )
//! .await?;
//!
//! provider.send(json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "id": 1}), |outcome| {
//!     println!("{outcome:?}");
//! });
//!
//! let block: String = provider.call(2, "eth_blockNumber", vec![]).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod options;
pub mod provider;

pub use agent::{AgentKind, ConnectionAgent};
pub use client::ReqwestTransport;
pub use options::{CustomAgent, ProviderOptions, DEFAULT_HOST};
pub use provider::HttpProvider;
