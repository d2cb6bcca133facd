//! Web-socket transport against a running supervisor.

use crate::supervisor::helpers::{
    REPLY_TIMEOUT, TEST_TOKEN, auth_request, connect_ws, parse, start_server, test_config,
    upgrade_request, wait_for_connected, ws_recv, ws_request,
};

use relay_core::supervisor::Delivery;

use futures_util::SinkExt;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

/// **VALUE**: A `GET ` request line selects the web-socket transport and
/// the same protocol runs over text frames.
///
/// **BUG THIS CATCHES**: Consuming the sniffed bytes before the upgrade,
/// which breaks the HTTP handshake.
#[tokio::test]
async fn given_ws_client_when_handshake_then_authorized_and_upgraded() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;

    let authorized = ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;
    assert_eq!(authorized, json!({"id": "1", "result": "authorized"}));

    let upgraded = ws_request(&mut ws, &upgrade_request("2")).await;
    assert_eq!(upgraded, json!({"id": "2", "result": "upgraded"}));

    handle.exit().await;
    handle.join().await.expect("Supervisor failed");
}

#[tokio::test]
async fn given_ws_client_when_method_out_of_order_then_invalid_request() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;

    let reply = ws_request(&mut ws, &upgrade_request("7")).await;

    assert_eq!(reply["id"], "7");
    assert_eq!(reply["error"]["code"], -32600);
    handle.exit().await;
}

#[tokio::test]
async fn given_binary_utf8_frame_when_received_then_treated_as_text() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;

    let line = auth_request("1", TEST_TOKEN);
    ws.send(Message::Binary(line.into_bytes().into()))
        .await
        .expect("Failed to send binary frame");

    let reply = ws_recv(&mut ws).await.expect("Connection closed");
    assert!(reply.contains("authorized"));
    handle.exit().await;
}

#[tokio::test]
async fn given_ws_client_when_operator_sends_then_text_frame_arrives() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;
    ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;

    let delivery = handle.send("hello frame").await.expect("send failed");

    assert_eq!(delivery, Delivery::Sent);
    assert_eq!(ws_recv(&mut ws).await.as_deref(), Some("hello frame"));
    handle.exit().await;
}

#[tokio::test]
async fn given_ws_client_when_operator_closes_then_close_frame_received() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;
    ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;

    assert!(handle.close().await);

    assert_eq!(ws_recv(&mut ws).await, None);
    wait_for_connected(&handle, false).await;
    handle.exit().await;
}

#[tokio::test]
async fn given_ws_client_when_it_disconnects_then_server_accepts_next() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;
    ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;

    ws.close(None).await.expect("Failed to close");
    drop(ws);
    wait_for_connected(&handle, false).await;

    let mut next = connect_ws(addr).await;
    let authorized = ws_request(&mut next, &auth_request("2", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

/// **VALUE**: A client that asks for `GET ` without the upgrade headers is
/// told why before the socket closes.
///
/// **BUG THIS CATCHES**: Dropping the peer silently, leaving a browser or
/// `curl` with an empty reply.
#[tokio::test]
async fn given_plain_http_get_when_upgrade_fails_then_bad_request_and_server_keeps_accepting() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = TcpStream::connect(addr).await.expect("Failed to connect");

    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .expect("Failed to write request");
    let mut response = Vec::new();
    tokio::time::timeout(REPLY_TIMEOUT, client.read_to_end(&mut response))
        .await
        .expect("Timed out waiting for the rejection")
        .expect("Failed to read the rejection");

    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
    assert!(response.contains("WebSocket handshake failed"), "{response}");

    let mut ws = connect_ws(addr).await;
    let authorized = ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}

#[tokio::test]
async fn given_binary_frame_not_utf8_when_received_then_parse_error_and_connection_kept() {
    let (handle, addr) = start_server(test_config()).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Binary(vec![0xff, 0xfe, b'{'].into()))
        .await
        .expect("Failed to send binary frame");
    let reply = parse(&ws_recv(&mut ws).await.expect("Connection closed"));
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], -32700);

    let authorized = ws_request(&mut ws, &auth_request("1", TEST_TOKEN)).await;
    assert_eq!(authorized["result"], "authorized");

    handle.exit().await;
}
