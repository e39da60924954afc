//! authrpc CLI — send JSON-RPC calls to a node, optionally behind bearer auth.
//!
//! Usage:
//! ```bash
//! # Probe an endpoint
//! authrpc test --url https://cloudflare-eth.com
//!
//! # Typed call with params
//! authrpc call --url http://localhost:8545 --method eth_getBalance \
//!     --params '["0x0000000000000000000000000000000000000000","latest"]'
//!
//! # Raw payload, token minted by a command on every refresh
//! authrpc send --url https://node.internal --token-cmd 'vault read -field=token rpc' \
//!     --payload '{"jsonrpc":"2.0","method":"net_version","id":1}'
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use authrpc_core::auth::{StaticToken, TokenSource};
use authrpc_core::error::AuthError;
use authrpc_core::transport::RpcProvider;
use authrpc_http::{HttpProvider, ProviderOptions};

use logging::{init_tracing, LogConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_tracing(&LogConfig {
        level: parse_flag(&args, "--log-level").unwrap_or_else(|| "warn".into()),
        json: args.iter().any(|a| a == "--json-logs"),
    });

    let result = match args[1].as_str() {
        "test" => cmd_test(&args[2..]).await,
        "call" => cmd_call(&args[2..]).await,
        "send" => cmd_send(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("authrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("authrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Send JSON-RPC calls over HTTP(S) with optional bearer-token auth\n");
    println!("USAGE:");
    println!("    authrpc <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    test       Probe an endpoint (latency, block number, auth)");
    println!("    call       Call a method and print the result");
    println!("    send       Send a raw JSON payload and print the response body");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>                 Node URL  [default: http://localhost:8545]");
    println!("    --method <NAME>             Method for `call`");
    println!("    --params <JSON>             JSON array of params for `call`");
    println!("    --payload <JSON>            Raw payload for `send`");
    println!("    --header <NAME:VALUE>       Extra request header (repeatable)");
    println!("    --timeout-ms <MS>           Request timeout, 0 = none  [default: 0]");
    println!("    --token <TOKEN>             Static bearer token");
    println!("    --token-cmd <CMD>           Shell command printing a bearer token");
    println!("    --sync-interval-ms <MS>     Token refresh interval  [default: 60000]");
    println!("    --no-keep-alive             Do not pool connections");
    println!("    --with-credentials          Keep and send cookies");
    println!("    --log-level <LEVEL>         Log filter  [default: warn]");
    println!("    --json-logs                 Emit JSON logs on stderr");
}

async fn cmd_test(args: &[String]) -> anyhow::Result<()> {
    let provider = build_provider(args).await?;
    println!("Testing {}...", provider.host());
    println!("  Auth:         {}", provider.auth_status());

    let start = Instant::now();
    let block: String = provider.call(1, "eth_blockNumber", vec![]).await?;
    let latency = start.elapsed();

    let block_num = u64::from_str_radix(block.trim_start_matches("0x"), 16).unwrap_or(0);

    println!("  Status:       OK");
    println!("  Block number: {block_num} ({block})");
    println!("  Latency:      {}ms", latency.as_millis());
    println!("  Health:       {}", provider.health());

    provider.disconnect();
    Ok(())
}

async fn cmd_call(args: &[String]) -> anyhow::Result<()> {
    let method = parse_flag(args, "--method").ok_or_else(|| anyhow!("--method is required"))?;
    let params = match parse_flag(args, "--params") {
        Some(raw) => match serde_json::from_str::<Value>(&raw).context("--params is not JSON")? {
            Value::Array(items) => items,
            _ => bail!("--params must be a JSON array"),
        },
        None => vec![],
    };

    let provider = build_provider(args).await?;
    let result: Value = provider.call(1, &method, params).await?;
    provider.disconnect();

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_send(args: &[String]) -> anyhow::Result<()> {
    let raw = parse_flag(args, "--payload").ok_or_else(|| anyhow!("--payload is required"))?;
    let payload: Value = serde_json::from_str(&raw).context("--payload is not JSON")?;

    let provider = build_provider(args).await?;
    let (tx, rx) = tokio::sync::oneshot::channel();
    provider.send(payload, move |outcome| {
        let _ = tx.send(outcome);
    });
    let body = rx.await.context("send callback dropped")??;
    provider.disconnect();

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn build_provider(args: &[String]) -> anyhow::Result<HttpProvider> {
    let url = parse_flag(args, "--url");
    let mut options = ProviderOptions::new()
        .keep_alive(!has_flag(args, "--no-keep-alive"))
        .with_credentials(has_flag(args, "--with-credentials"));

    if let Some(ms) = parse_flag(args, "--timeout-ms") {
        options = options.timeout(Duration::from_millis(ms.parse().context("--timeout-ms")?));
    }
    if let Some(ms) = parse_flag(args, "--sync-interval-ms") {
        let ms = ms.parse().context("--sync-interval-ms")?;
        options = options.sync_interval(Duration::from_millis(ms));
    }
    for raw in parse_all(args, "--header") {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("--header must be NAME:VALUE, got {raw}"))?;
        options = options.header(name.trim(), value.trim());
    }

    let token = parse_flag(args, "--token");
    let token_cmd = parse_flag(args, "--token-cmd");
    let source: Option<Arc<dyn TokenSource>> = match (token, token_cmd) {
        (Some(_), Some(_)) => bail!("--token and --token-cmd are mutually exclusive"),
        (Some(token), None) => Some(Arc::new(StaticToken::new(token)) as Arc<dyn TokenSource>),
        (None, Some(command)) => Some(Arc::new(CommandToken { command }) as Arc<dyn TokenSource>),
        (None, None) => None,
    };
    if let Some(source) = source {
        options = options.token_source(source);
    }

    Ok(HttpProvider::connect(url.as_deref(), options).await?)
}

/// Runs a shell command and uses its trimmed stdout as the token.
struct CommandToken {
    command: String,
}

#[async_trait]
impl TokenSource for CommandToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .await
            .map_err(|e| AuthError::Refresh(format!("failed to run token command: {e}")))?;

        if !output.status.success() {
            return Err(AuthError::Refresh(format!(
                "token command exited with {}",
                output.status
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::Refresh("token command printed nothing".into()));
        }
        tracing::debug!("token command produced a new token");
        Ok(token)
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_all(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
