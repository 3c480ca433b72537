//! Requests served over loopback UDP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use swim_bootable::Bootable;
use swim_dispatch::{DispatchClient, DispatchServer, Dispatcher, Error, Request, Response};
use swim_membership::{Member, MembershipView, Status};
use tokio::net::UdpSocket;

async fn start_server(view: Arc<MembershipView>) -> (DispatchServer, SocketAddr) {
    let _ = tracing_subscriber::fmt::try_init();

    let server = DispatchServer::new(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        Dispatcher::new(view),
    );
    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();
    (server, addr)
}

#[tokio::test]
async fn test_snapshot_and_merge_over_udp() {
    let view = Arc::new(MembershipView::with_members(vec![Member::new("a", 7201)]));
    let (server, addr) = start_server(Arc::clone(&view)).await;
    let client = DispatchClient::default();

    let outcome = client
        .push_merge(addr, vec![Member::new("b", 7202), Member::new("a", 7201)])
        .await
        .unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.updated, 0);

    let members = client.fetch_snapshot(addr).await.unwrap();
    let ids: Vec<&str> = members.iter().map(Member::id).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(view.len(), 2);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mark_suspicious_over_udp() {
    let view = Arc::new(MembershipView::with_members(vec![Member::new("a", 7201)]));
    let (server, addr) = start_server(Arc::clone(&view)).await;
    let client = DispatchClient::default();

    let response = client
        .request(
            addr,
            &Request::MarkSuspicious {
                id: "a".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response, Response::Updated { changed: true });
    assert_eq!(view.get("a").unwrap().status(), Status::Suspicious);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_datagram_gets_error_reply() {
    let view = Arc::new(MembershipView::new());
    let (server, addr) = start_server(view).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(b"definitely not json", addr).await.unwrap();

    let mut buf = vec![0u8; 1024];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_matches!(
        Response::try_from(&buf[..len]).unwrap(),
        Response::Error { .. }
    );

    // The server keeps serving after a bad datagram.
    let client = DispatchClient::default();
    assert_eq!(
        client.request(addr, &Request::Length).await.unwrap(),
        Response::Length { length: 0 }
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_local_addr_requires_start() {
    let server = DispatchServer::new(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        Dispatcher::new(Arc::new(MembershipView::new())),
    );

    assert_matches!(server.local_addr().await, Err(Error::NotStarted));

    server.start().await.unwrap();
    assert!(server.local_addr().await.is_ok());

    server.shutdown().await.unwrap();
    assert_matches!(server.local_addr().await, Err(Error::NotStarted));
}

#[tokio::test]
async fn test_request_times_out_without_server() {
    // Bound but never answering.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = silent.local_addr().unwrap();
    let client = DispatchClient::new(Duration::from_millis(50));

    assert_matches!(
        client.request(addr, &Request::Length).await,
        Err(Error::Timeout(_))
    );
}
