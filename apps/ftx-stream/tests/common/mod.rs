//! Recording fake transport shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use ftx_stream::{
    ClientConfig, CloseCode, Frame, ReadyState, StreamEvent, Transport, TransportError,
    TransportEvents, TransportFactory,
};

pub const TEST_ENDPOINT: &str = "wss://ftx.test/ws/";

/// Client configuration with default timings and a test endpoint.
pub fn test_config() -> ClientConfig {
    ClientConfig::new(TEST_ENDPOINT)
}

/// Receive the next event, failing after one (virtual) second.
pub async fn next_event(rx: &mut broadcast::Receiver<StreamEvent>) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for stream event")
        .expect("event hub closed")
}

/// Drain everything currently queued.
pub fn drain(rx: &mut broadcast::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

// =============================================================================
// Call Log
// =============================================================================

/// Everything the fake transports were asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    pub creates: AtomicUsize,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub close_codes: Mutex<Vec<u16>>,
    pub sent: Mutex<Vec<String>>,
    pub endpoints: Mutex<Vec<String>>,
    hang_connect: AtomicBool,
    fail_connect: AtomicBool,
    fail_close: AtomicBool,
}

impl CallLog {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Test-side view of one fake transport: drives its callbacks.
#[derive(Debug, Clone)]
pub struct FakeHandle {
    events: TransportEvents,
    state: Arc<RwLock<ReadyState>>,
}

impl FakeHandle {
    pub async fn open(&self) {
        self.events.opened().await;
    }

    pub async fn text(&self, text: &str) {
        self.events.message(Frame::Text(text.to_string())).await;
    }

    pub async fn binary(&self, bytes: Vec<u8>) {
        self.events.message(Frame::Binary(bytes)).await;
    }

    pub async fn error(&self, message: &str) {
        self.events.error(message).await;
    }

    pub async fn drop_connection(&self) {
        *self.state.write() = ReadyState::Closed;
        self.events.closed().await;
    }

    pub fn is_detached(&self) -> bool {
        self.events.is_detached()
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.state.read()
    }
}

// =============================================================================
// Transport
// =============================================================================

struct FakeTransport {
    log: Arc<CallLog>,
    state: Arc<RwLock<ReadyState>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        if self.log.hang_connect.load(Ordering::SeqCst) {
            *self.state.write() = ReadyState::Connecting;
            std::future::pending::<()>().await;
        }
        if self.log.fail_connect.load(Ordering::SeqCst) {
            *self.state.write() = ReadyState::Closed;
            return Err(TransportError::ConnectionFailed("refused".to_string()));
        }
        *self.state.write() = ReadyState::Open;
        Ok(())
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.log.close_codes.lock().push(code.code());
        *self.state.write() = ReadyState::Closed;
        if self.log.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Io("already closed".to_string()));
        }
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.log.sent.lock().push(text);
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.read()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Builds fake transports and keeps a handle to each one.
#[derive(Debug, Default)]
pub struct FakeFactory {
    pub log: Arc<CallLog>,
    handles: Mutex<Vec<FakeHandle>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handle of the transport built for `generation` (1-based).
    pub fn handle(&self, generation: u64) -> FakeHandle {
        let index = usize::try_from(generation - 1).unwrap();
        self.handles.lock()[index].clone()
    }

    pub fn hang_connects(&self, hang: bool) {
        self.log.hang_connect.store(hang, Ordering::SeqCst);
    }

    pub fn fail_connects(&self, fail: bool) {
        self.log.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_closes(&self, fail: bool) {
        self.log.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self, endpoint: &str, events: TransportEvents) -> Box<dyn Transport> {
        self.log.creates.fetch_add(1, Ordering::SeqCst);
        self.log.endpoints.lock().push(endpoint.to_string());

        let state = Arc::new(RwLock::new(ReadyState::Closed));
        self.handles.lock().push(FakeHandle {
            events,
            state: Arc::clone(&state),
        });

        Box::new(FakeTransport {
            log: Arc::clone(&self.log),
            state,
        })
    }
}
