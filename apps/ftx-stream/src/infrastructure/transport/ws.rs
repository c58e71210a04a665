//! WebSocket Transport
//!
//! One `tokio-tungstenite` connection per [`WsTransport`]. `connect` performs
//! the handshake and spawns a reader task; the reader forwards text and
//! binary frames to the owner and reports errors and the end of the stream.
//! Pings are answered by tungstenite itself while the reader polls.
//!
//! The same transport can be connected again after `close`, which is what a
//! soft reconnect relies on.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{Transport, TransportError, TransportEvents, TransportFactory};
use crate::domain::connection::{CloseCode, ReadyState};
use crate::domain::frame::Frame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Transport
// =============================================================================

/// WebSocket connection to a single endpoint.
pub struct WsTransport {
    endpoint: String,
    events: TransportEvents,
    state: Arc<RwLock<ReadyState>>,
    writer: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Create an unconnected transport for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, events: TransportEvents) -> Self {
        Self {
            endpoint: endpoint.into(),
            events,
            state: Arc::new(RwLock::new(ReadyState::Closed)),
            writer: None,
            reader: None,
        }
    }

    fn set_state(&self, state: ReadyState) {
        *self.state.write() = state;
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ready_state().is_active() {
            return Ok(());
        }

        self.stop_reader();
        self.set_state(ReadyState::Connecting);
        tracing::debug!(
            generation = self.events.generation(),
            endpoint = %self.endpoint,
            "Opening WebSocket"
        );

        let stream = match tokio_tungstenite::connect_async(self.endpoint.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.set_state(ReadyState::Closed);
                return Err(TransportError::ConnectionFailed(e.to_string()));
            }
        };

        let (writer, reader) = stream.split();
        self.writer = Some(writer);
        self.set_state(ReadyState::Open);
        self.reader = Some(tokio::spawn(read_loop(
            reader,
            self.events.clone(),
            Arc::clone(&self.state),
        )));
        Ok(())
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        // The reader marks the state Closed once the peer has closed.
        let peer_closed = self.ready_state() == ReadyState::Closed;
        let Some(mut writer) = self.writer.take().filter(|_| !peer_closed) else {
            self.stop_reader();
            self.set_state(ReadyState::Closed);
            return Ok(());
        };

        self.set_state(ReadyState::Closing);
        let frame = CloseFrame {
            code: WsCloseCode::from(code.code()),
            reason: "".into(),
        };
        let result = writer.send(Message::Close(Some(frame))).await;

        self.stop_reader();
        self.set_state(ReadyState::Closed);
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_already_closed(&e) => {
                tracing::debug!(
                    generation = self.events.generation(),
                    error = %e,
                    "Socket already closed by peer"
                );
                Ok(())
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.read()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("endpoint", &self.endpoint)
            .field("generation", &self.events.generation())
            .field("state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

/// Forward inbound frames until the stream ends or the owner detaches.
async fn read_loop(mut reader: WsSource, events: TransportEvents, state: Arc<RwLock<ReadyState>>) {
    events.opened().await;

    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => events.message(Frame::Text(text.as_str().to_owned())).await,
            Ok(Message::Binary(data)) => events.message(Frame::Binary(data.to_vec())).await,
            Ok(Message::Close(frame)) => {
                tracing::debug!(generation = events.generation(), ?frame, "Close frame received");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                events.error(e.to_string()).await;
                break;
            }
        }

        if events.is_detached() {
            tracing::debug!(generation = events.generation(), "Owner detached, stopping reader");
            break;
        }
    }

    *state.write() = ReadyState::Closed;
    events.closed().await;
}

/// Errors tungstenite returns for writes after the close handshake started.
fn is_already_closed(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::SendAfterClosing)
    )
}

// =============================================================================
// Factory
// =============================================================================

/// Builds [`WsTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransportFactory;

impl WsTransportFactory {
    /// Create a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self, endpoint: &str, events: TransportEvents) -> Box<dyn Transport> {
        Box::new(WsTransport::new(endpoint, events))
    }
}

// =============================================================================
// Tests
// =============================================================================
