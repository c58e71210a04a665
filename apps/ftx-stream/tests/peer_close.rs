//! Peer Close Integration Tests
//!
//! Runs the client over real WebSocket transports against a local server
//! that closes the first connection, and checks the watchdog dials again.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use ftx_stream::{
    ClientConfig, FtxStreamClient, LivenessPolicy, StreamEvent, SupervisorState,
    WsTransportFactory,
};

/// Close the first connection right after the handshake; feed later ones
/// a text frame every 50 ms.
async fn spawn_server(accepts: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let first = accepts.fetch_add(1, Ordering::SeqCst) == 0;
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                if first {
                    let _ = ws.send(Message::Close(None)).await;
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }
                let mut ticker = tokio::time::interval(Duration::from_millis(50));
                loop {
                    ticker.tick().await;
                    if ws.send(Message::Text(r#"{"type":"pong"}"#.into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn soft_reconnect_redials_after_peer_close() {
    let accepts = Arc::new(AtomicUsize::new(0));
    let endpoint = spawn_server(Arc::clone(&accepts)).await;

    let mut config = ClientConfig::new(endpoint);
    config.supervisor.watchdog_interval = Duration::from_millis(50);
    config.supervisor.liveness =
        LivenessPolicy::new(Duration::from_millis(300), Duration::from_secs(30)).unwrap();
    let client = FtxStreamClient::new(config, Arc::new(WsTransportFactory::new()));
    let mut events = client.events();

    client.connect(true).await.unwrap();

    let mut seen = Vec::new();
    let recovered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            let done = matches!(event, StreamEvent::Message(_));
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;

    assert!(recovered.is_ok(), "no message after peer close, events: {seen:?}");
    assert_eq!(seen[0], StreamEvent::Opened { generation: 1 });
    assert!(seen.contains(&StreamEvent::Closed { generation: 1 }));
    assert!(seen.contains(&StreamEvent::Reconnecting { generation: 1 }));
    assert_eq!(accepts.load(Ordering::SeqCst), 2);

    let snapshot = client.status().snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.reinitializations, 0);
    assert_eq!(snapshot.state, SupervisorState::Open);

    client.shutdown().await;
}

#[tokio::test]
async fn send_after_peer_close_is_dropped() {
    let accepts = Arc::new(AtomicUsize::new(0));
    let endpoint = spawn_server(Arc::clone(&accepts)).await;

    let client = FtxStreamClient::new(
        ClientConfig::new(endpoint),
        Arc::new(WsTransportFactory::new()),
    );
    let mut events = client.events();

    client.connect(false).await.unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            if matches!(event, StreamEvent::Closed { .. }) {
                return;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "peer close was not reported");

    let outcome = client.subscribe("markets").await.unwrap();
    assert!(!outcome.is_sent());
    assert_eq!(client.status().state(), SupervisorState::Closed);

    client.disconnect().await.unwrap();
    client.shutdown().await;
}
