//! Watchdog Integration Tests
//!
//! Drives the supervisor on a paused clock against recording fake
//! transports and checks reconnect and re-initialize behavior.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{FakeFactory, TEST_ENDPOINT, drain, next_event, test_config};
use ftx_stream::{
    ClientError, FtxStreamClient, LivenessPolicy, ReadyState, StreamEvent, SupervisorError,
    SupervisorState,
};

#[tokio::test(start_paused = true)]
async fn silence_triggers_one_soft_reconnect_then_one_reinitialize() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    factory.handle(1).open().await;
    assert_eq!(next_event(&mut events).await, StreamEvent::Opened { generation: 1 });

    tokio::time::sleep(Duration::from_secs(126)).await;

    assert_eq!(factory.log.creates(), 2);
    assert_eq!(factory.log.connects(), 3);
    assert_eq!(factory.log.closes(), 2);
    assert_eq!(*factory.log.close_codes.lock(), vec![1000, 1000]);

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![
            StreamEvent::Reconnecting { generation: 1 },
            StreamEvent::Reinitialized { generation: 2 },
        ]
    );

    let snapshot = client.status().snapshot();
    assert_eq!(snapshot.soft_reconnects, 1);
    assert_eq!(snapshot.reinitializations, 1);
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.state, SupervisorState::Open);
}

#[tokio::test(start_paused = true)]
async fn soft_reconnect_happens_after_first_threshold_crossing() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());

    client.connect(true).await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(factory.log.closes(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(factory.log.closes(), 1);
    assert_eq!(factory.log.connects(), 2);
    assert_eq!(factory.log.creates(), 1);

    // Still inside the same silence period: no further soft reconnects.
    tokio::time::sleep(Duration::from_secs(50)).await;
    assert_eq!(factory.log.closes(), 1);
    assert_eq!(factory.log.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_keep_connection_alive() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    let handle = factory.handle(1);

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.text(r#"{"type":"pong"}"#).await;
        assert_eq!(
            next_event(&mut events).await,
            StreamEvent::Message(r#"{"type":"pong"}"#.to_string())
        );
    }

    assert_eq!(factory.log.closes(), 0);
    assert_eq!(factory.log.connects(), 1);
    assert_eq!(factory.log.creates(), 1);
}

#[tokio::test(start_paused = true)]
async fn inbound_frame_rearms_soft_reconnect() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    let handle = factory.handle(1);

    tokio::time::sleep(Duration::from_secs(66)).await;
    assert_eq!(factory.log.closes(), 1);
    assert_eq!(next_event(&mut events).await, StreamEvent::Reconnecting { generation: 1 });

    handle.text("{}").await;
    assert_eq!(next_event(&mut events).await, StreamEvent::Message("{}".to_string()));

    // The new silence period starts at t=66; the t=130 tick acts on it.
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(factory.log.closes(), 2);
    assert_eq!(factory.log.creates(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_watchdog_actions_after_disconnect() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());

    client.connect(true).await.unwrap();
    client.disconnect().await.unwrap();
    assert_eq!(factory.log.closes(), 1);

    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(factory.log.creates(), 1);
    assert_eq!(factory.log.connects(), 1);
    assert_eq!(factory.log.closes(), 1);
    assert_eq!(client.status().state(), SupervisorState::Closed);
}

#[tokio::test(start_paused = true)]
async fn connect_without_auto_reconnect_never_reconnects() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());

    client.connect(false).await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(factory.log.connects(), 1);
    assert_eq!(factory.log.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn reinitialize_detaches_previous_transport() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    let old = factory.handle(1);
    assert!(!old.is_detached());

    tokio::time::sleep(Duration::from_secs(126)).await;
    drain(&mut events);

    assert!(old.is_detached());
    assert_eq!(*factory.log.endpoints.lock(), vec![TEST_ENDPOINT, TEST_ENDPOINT]);

    // Late callbacks from the discarded transport go nowhere.
    old.text("stale").await;
    old.open().await;

    let current = factory.handle(2);
    current.text("fresh").await;
    assert_eq!(next_event(&mut events).await, StreamEvent::Message("fresh".to_string()));
}

#[tokio::test(start_paused = true)]
async fn transport_error_does_not_reconnect() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    factory.handle(1).error("connection reset").await;

    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::TransportError("connection reset".to_string())
    );
    assert_eq!(factory.log.closes(), 0);
    assert_eq!(factory.log.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_connect_is_bounded() {
    let factory = FakeFactory::new();
    factory.hang_connects(true);
    let client = FtxStreamClient::new(test_config(), factory.clone());

    let result = client.connect(true).await;
    assert!(matches!(
        result,
        Err(ClientError::Supervisor(SupervisorError::Timeout { op: "connect", .. }))
    ));

    // The supervisor is still responsive after the timeout.
    factory.hang_connects(false);
    client.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_initial_connect_is_retried_by_watchdog() {
    let factory = FakeFactory::new();
    factory.fail_connects(true);
    let client = FtxStreamClient::new(test_config(), factory.clone());

    assert!(client.connect(true).await.is_err());
    factory.fail_connects(false);

    tokio::time::sleep(Duration::from_secs(66)).await;

    assert_eq!(factory.log.connects(), 2);
    assert_eq!(client.status().state(), SupervisorState::Open);
}

#[tokio::test(start_paused = true)]
async fn soft_reconnect_connects_even_when_close_fails() {
    let factory = FakeFactory::new();
    let client = FtxStreamClient::new(test_config(), factory.clone());
    let mut events = client.events();

    client.connect(true).await.unwrap();
    let handle = factory.handle(1);
    handle.open().await;
    handle.drop_connection().await;
    factory.fail_closes(true);

    tokio::time::sleep(Duration::from_secs(66)).await;

    assert_eq!(factory.log.closes(), 1);
    assert_eq!(factory.log.connects(), 2);
    assert_eq!(factory.log.creates(), 1);
    assert_eq!(handle.ready_state(), ReadyState::Open);
    assert_eq!(client.status().state(), SupervisorState::Open);
    assert!(drain(&mut events).contains(&StreamEvent::Reconnecting { generation: 1 }));
}

#[tokio::test(start_paused = true)]
async fn custom_thresholds_are_honored() {
    let factory = FakeFactory::new();
    let mut config = test_config();
    config.supervisor.watchdog_interval = Duration::from_secs(1);
    config.supervisor.liveness =
        LivenessPolicy::new(Duration::from_secs(10), Duration::from_secs(20)).unwrap();
    let client = FtxStreamClient::new(config, factory.clone());

    client.connect(true).await.unwrap();

    tokio::time::sleep(Duration::from_millis(11_500)).await;
    assert_eq!(factory.log.closes(), 1);
    assert_eq!(factory.log.creates(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(factory.log.creates(), 2);
}
