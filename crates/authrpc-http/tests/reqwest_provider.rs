//! End-to-end tests of `HttpProvider` over the real reqwest transport
//! against a local wiremock node.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authrpc_core::{ProviderError, RpcProvider, AUTHORIZATION};
use authrpc_http::{CustomAgent, HttpProvider, ProviderOptions};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn block_number() -> Value {
    json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "id": 1})
}

#[tokio::test]
async fn posts_json_with_configured_and_bearer_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Client", "authrpc-tests"))
        .and(header("Authorization", "Bearer tok1"))
        .and(body_json(block_number()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#, "application/json"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let options = ProviderOptions::new()
        .header("X-Client", "authrpc-tests")
        .access_token(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(format!("tok{n}")) }
        });

    let host = format!("{}/rpc", mock_server.uri());
    let provider = HttpProvider::connect(Some(host.as_str()), options).await.unwrap();

    let result = provider.request(block_number()).await.unwrap();
    assert_eq!(result, json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}));
    assert!(provider.is_connected());

    let requests = mock_server.received_requests().await.unwrap();
    let auth_headers: Vec<_> = requests[0].headers.get_all(AUTHORIZATION).iter().collect();
    assert_eq!(auth_headers.len(), 1);
}

#[tokio::test]
async fn server_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let provider = HttpProvider::connect(Some(mock_server.uri().as_str()), ProviderOptions::default())
        .await
        .unwrap();

    match provider.request(block_number()).await {
        Err(ProviderError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_is_not_a_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"expired"}"#))
        .mount(&mock_server)
        .await;

    let provider = HttpProvider::connect(Some(mock_server.uri().as_str()), ProviderOptions::default())
        .await
        .unwrap();

    let err = provider.request(block_number()).await.unwrap_err();
    assert!(matches!(err, ProviderError::HttpStatus { status: 401, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn non_json_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&mock_server)
        .await;

    let provider = HttpProvider::connect(Some(mock_server.uri().as_str()), ProviderOptions::default())
        .await
        .unwrap();

    match provider.request(block_number()).await {
        Err(ProviderError::InvalidResponse { body }) => assert_eq!(body, "not json at all"),
        other => panic!("expected InvalidResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_node_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let provider = HttpProvider::connect(
        Some(mock_server.uri().as_str()),
        ProviderOptions::new().timeout(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    let err = provider.request(block_number()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ConnectionTimeout { ms: 100 }));
    assert!(!provider.is_connected());
}

#[tokio::test]
async fn refused_connection_is_invalid_connection() {
    // Bind then drop a listener so the port is known to be closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let host = format!("http://127.0.0.1:{port}");

    let provider = HttpProvider::connect(Some(host.as_str()), ProviderOptions::default())
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    provider.send(block_number(), move |outcome| {
        let _ = tx.send(outcome);
    });

    match rx.await.unwrap() {
        Err(ProviderError::InvalidConnection { host: got }) => assert_eq!(got, host),
        other => panic!("expected InvalidConnection, got {other:?}"),
    }
    assert!(!provider.is_connected());
}

#[tokio::test]
async fn custom_agent_resolves_relative_host() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let agent = CustomAgent {
        http: Some(reqwest::Client::new()),
        https: None,
        base_url: Some(format!("{}/v1/", mock_server.uri())),
    };
    let provider = HttpProvider::connect(Some("rpc"), ProviderOptions::new().agent(agent))
        .await
        .unwrap();

    let result = provider.request(json!({})).await.unwrap();
    assert_eq!(result, json!({"ok": true}));
}

async fn cookie_header_on_second_request(with_credentials: bool) -> Option<String> {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=abc; Path=/")
                .set_body_string("{}"),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = HttpProvider::connect(
        Some(mock_server.uri().as_str()),
        ProviderOptions::new().with_credentials(with_credentials),
    )
    .await
    .unwrap();

    provider.request(block_number()).await.unwrap();
    provider.request(block_number()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get("cookie").is_none());
    requests[1]
        .headers
        .get("cookie")
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn credentials_send_back_node_cookies() {
    assert_eq!(
        cookie_header_on_second_request(true).await.as_deref(),
        Some("session=abc")
    );
}

#[tokio::test]
async fn cookies_are_dropped_without_credentials() {
    assert_eq!(cookie_header_on_second_request(false).await, None);
}
