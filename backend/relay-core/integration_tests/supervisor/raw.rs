//! Raw `\r\n` transport against a running supervisor.

use crate::supervisor::helpers::{
    RawClient, TEST_TOKEN, auth_request, start_server, test_config, upgrade_request,
    wait_for_connected,
};

use relay_core::config::ServerConfig;
use relay_core::supervisor::{Delivery, REMOTE_LOG_COMMAND};

use std::collections::HashSet;

use serde_json::{Value, json};

/// **VALUE**: The whole handshake works over a plain TCP line stream.
///
/// **BUG THIS CATCHES**: Losing the four sniffed bytes, which would corrupt
/// the first request and fail it as invalid JSON.
#[tokio::test]
async fn given_raw_client_when_handshake_then_authorized_and_upgraded() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;

    let authorized = client.request(&auth_request("1", TEST_TOKEN)).await;
    assert_eq!(authorized, json!({"id": "1", "result": "authorized"}));

    let upgraded = client.request(&upgrade_request("2")).await;
    assert_eq!(upgraded, json!({"id": "2", "result": "upgraded"}));

    let echoed = client
        .request(r#"{"id":"p","method":"ping","params":["42.000000"]}"#)
        .await;
    assert_eq!(echoed, json!({"id": "p", "result": "42.000000"}));

    handle.exit().await;
    handle.join().await.expect("Supervisor failed");
}

#[tokio::test]
async fn given_wrong_hash_when_authorization_then_error_and_retry_allowed() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;

    let rejected = client.request(&auth_request("1", "guess")).await;
    assert_eq!(rejected["error"]["code"], 102);
    assert_eq!(rejected["id"], "1");

    let authorized = client.request(&auth_request("2", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

#[tokio::test]
async fn given_garbage_line_when_received_then_parse_error_and_connection_kept() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;

    let reply = client.request("this is not json").await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], -32700);

    let authorized = client.request(&auth_request("1", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

/// **VALUE**: Bytes that are not UTF-8 are just another malformed line.
///
/// **BUG THIS CATCHES**: A strict UTF-8 line reader fails the read and
/// drops the client instead of answering `-32700`.
#[tokio::test]
async fn given_non_utf8_line_when_received_then_parse_error_and_connection_kept() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;

    client.send_bytes(b"\xff\xfe not json\r\n").await;
    let reply = client.recv_json().await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], -32700);
    assert!(handle.is_connected().await);

    client.handshake(TEST_TOKEN).await;
    client.send_bytes(b"{\"id\":\"3\",\xc3\x28}\r\n").await;
    let reply = client.recv_json().await;
    assert_eq!(reply["error"]["code"], -32700);

    let echoed = client
        .request(r#"{"id":"p","method":"ping","params":["7"]}"#)
        .await;
    assert_eq!(echoed, json!({"id": "p", "result": "7"}));

    handle.exit().await;
}

#[tokio::test]
async fn given_empty_line_when_received_then_connection_closed() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    client.send("").await;

    assert_eq!(client.recv().await, None);
    handle.exit().await;
}

/// **VALUE**: Brute-forcing the token is cut short when a limit is set.
///
/// **BUG THIS CATCHES**: Counting attempts across connections, or never
/// tearing the connection down once the limit is hit.
#[tokio::test]
async fn given_attempt_limit_when_exceeded_then_connection_dropped() {
    let config = ServerConfig {
        auth_attempt_limit: 2,
        ..test_config()
    };
    let (handle, addr) = start_server(config).await;
    let mut client = RawClient::connect(addr).await;

    let first = client.request(&auth_request("1", "bad")).await;
    assert_eq!(first["error"]["code"], 102);
    let second = client.request(&auth_request("2", "bad")).await;
    assert_eq!(second["error"]["code"], 102);

    assert_eq!(client.recv().await, None);

    // A fresh connection starts counting from zero.
    let mut next = RawClient::connect(addr).await;
    let authorized = next.request(&auth_request("3", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

#[tokio::test]
async fn given_token_changed_when_old_hash_sent_then_rejected() {
    let (handle, addr) = start_server(test_config()).await;
    handle.set_token("rotated").await.expect("set_token failed");

    let mut client = RawClient::connect(addr).await;
    let rejected = client.request(&auth_request("1", TEST_TOKEN)).await;
    assert_eq!(rejected["error"]["code"], 102);

    let authorized = client.request(&auth_request("2", "rotated")).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

#[tokio::test]
async fn given_connected_client_when_operator_sends_then_line_arrives_verbatim() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    let delivery = handle.send("anything at all").await.expect("send failed");

    assert_eq!(delivery, Delivery::Sent);
    assert_eq!(client.recv().await.as_deref(), Some("anything at all"));
    handle.exit().await;
}

#[tokio::test]
async fn given_active_client_when_operator_pings_then_probe_arrives() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    handle.ping().await.expect("ping failed");

    let probe = client.recv_json().await;
    assert_eq!(probe["id"], "pong");
    assert_eq!(probe["method"], "ping");
    let stamp = probe["params"][0].as_str().expect("stamp missing");
    assert!(stamp.parse::<f64>().is_ok());

    // Echo it back; the server consumes the reply without answering.
    client
        .send(&format!(r#"{{"id":"pong","result":"{stamp}"}}"#))
        .await;
    assert!(client.is_silent().await);

    handle.exit().await;
}

/// **VALUE**: Concurrent operator sends never interleave on the wire.
///
/// **BUG THIS CATCHES**: Writing without holding the connection lock, which
/// splices two lines together on a raw stream.
#[tokio::test]
async fn given_concurrent_sends_when_received_then_every_line_is_whole() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    let expected: HashSet<String> = (0..32)
        .map(|n| format!("message-{n}-{}", "x".repeat(2048)))
        .collect();

    let mut tasks = Vec::new();
    for line in expected.iter().cloned() {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.send(&line).await }));
    }

    let mut received = HashSet::new();
    for _ in 0..expected.len() {
        received.insert(client.recv().await.expect("Connection closed"));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), Delivery::Sent);
    }

    assert_eq!(received, expected);
    handle.exit().await;
}

#[tokio::test]
async fn given_remote_log_when_enabled_then_client_told_and_input_not_dispatched() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    handle.remote_log().await.expect("remote_log failed");
    assert_eq!(client.recv().await.as_deref(), Some(REMOTE_LOG_COMMAND));

    client
        .send(r#"{"id":"p","method":"ping","params":["1"]}"#)
        .await;
    assert!(client.is_silent().await);
    assert!(handle.is_connected().await);

    handle.exit().await;
}

#[tokio::test]
async fn given_operator_close_when_client_connected_then_eof_and_server_keeps_accepting() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    assert!(handle.close().await);
    assert_eq!(client.recv().await, None);
    wait_for_connected(&handle, false).await;

    let mut next = RawClient::connect(addr).await;
    next.handshake(TEST_TOKEN).await;
    assert!(handle.is_connected().await);

    handle.exit().await;
}
