//! Start, reload and exit.

use crate::supervisor::helpers::{
    RawClient, TEST_TOKEN, start_server, test_config, wait_for_rebind,
};

use relay_core::error::supervisor::SupervisorError;
use relay_core::supervisor::{self, Delivery};

use tokio::net::TcpListener;

#[tokio::test]
async fn given_no_client_when_send_then_no_clients() {
    let (handle, _addr) = start_server(test_config()).await;

    let delivery = handle.send("nobody listens").await.expect("send failed");

    assert_eq!(delivery, Delivery::NoClients);
    assert!(!handle.close().await);
    handle.exit().await;
}

#[tokio::test]
async fn given_no_client_when_remote_log_then_no_clients() {
    let (handle, _addr) = start_server(test_config()).await;

    let delivery = handle.remote_log().await.expect("remote_log failed");

    assert_eq!(delivery, Delivery::NoClients);
    handle.exit().await;
}

/// **VALUE**: A taken address is reported as a fatal bind error.
///
/// **BUG THIS CATCHES**: Swallowing the bind failure and returning a handle
/// to a server that never listens.
#[tokio::test]
async fn given_address_in_use_when_start_then_bind_error() {
    let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = blocker.local_addr().unwrap();
    let config = relay_core::config::ServerConfig {
        port: taken.port(),
        ..test_config()
    };

    let result = supervisor::start(config).await;

    assert!(matches!(result, Err(SupervisorError::Bind { .. })));
}

#[tokio::test]
async fn given_invalid_ip_when_set_ip_then_rejected_and_still_serving() {
    let (handle, addr) = start_server(test_config()).await;

    let result = handle.set_ip("not an ip").await;

    assert!(matches!(result, Err(SupervisorError::Config(_))));
    assert_eq!(handle.ip().await, "127.0.0.1");
    assert_eq!(handle.local_addr(), Some(addr));
    handle.exit().await;
}

/// **VALUE**: Changing the port rebinds and drops the current client.
///
/// **BUG THIS CATCHES**: Updating the config without reloading, or keeping
/// the old connection alive on the released listener.
#[tokio::test]
async fn given_connected_client_when_port_changed_then_client_dropped_and_new_port_serves() {
    let (handle, old_addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(old_addr).await;
    client.handshake(TEST_TOKEN).await;

    handle.set_port(0).await.expect("set_port failed");

    assert_eq!(client.recv().await, None);
    let new_addr = wait_for_rebind(&handle, old_addr).await;

    let mut next = RawClient::connect(new_addr).await;
    next.handshake(TEST_TOKEN).await;
    assert_eq!(handle.port().await, 0);

    handle.exit().await;
    handle.join().await.expect("Supervisor failed");
}

#[tokio::test]
async fn given_running_server_when_exit_then_join_completes_and_listener_released() {
    let (handle, addr) = start_server(test_config()).await;
    let mut client = RawClient::connect(addr).await;
    client.handshake(TEST_TOKEN).await;

    handle.exit().await;
    handle.join().await.expect("Supervisor failed");

    assert_eq!(client.recv().await, None);
    assert!(!handle.is_running());
    assert_eq!(handle.local_addr(), None);
    assert!(handle.reload().await.is_err());

    // Exiting twice is harmless.
    handle.exit().await;
}

#[tokio::test]
async fn given_bound_server_when_bound_addr_then_matches_local_addr() {
    let (handle, addr) = start_server(test_config()).await;

    assert_eq!(handle.bound_addr().await, Some(addr));
    handle.exit().await;
}
