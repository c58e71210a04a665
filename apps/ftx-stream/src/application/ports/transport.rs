use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::connection::{CloseCode, ReadyState};
use crate::domain::frame::Frame;

/// Errors reported by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Write was attempted without an open connection.
    #[error("transport is not connected")]
    NotConnected,

    /// Underlying socket error.
    #[error("transport error: {0}")]
    Io(String),
}

/// Notification from a transport to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// The transport hit an error. Informational only.
    Error(String),
    /// A frame arrived.
    Message(Frame),
    /// The peer or the network closed the connection.
    Closed,
}

/// Sending half of a transport's event channel.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
}

impl TransportEvents {
    /// Wrap an event sender for transport `generation`.
    #[must_use]
    pub const fn new(generation: u64, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the transport these events belong to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the owner has detached from this transport.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    /// Report that the handshake completed.
    pub async fn opened(&self) {
        self.emit(TransportEvent::Opened).await;
    }

    /// Report an error.
    pub async fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into())).await;
    }

    /// Deliver an inbound frame.
    pub async fn message(&self, frame: Frame) {
        self.emit(TransportEvent::Message(frame)).await;
    }

    /// Report that the connection closed.
    pub async fn closed(&self) {
        self.emit(TransportEvent::Closed).await;
    }

    async fn emit(&self, event: TransportEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::trace!(generation = self.generation, "Event dropped, transport detached");
        }
    }
}

/// A single WebSocket connection.
///
/// Implementations must be safe to `connect` again after `close`.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection. A call while connecting or open is a no-op.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection with `code`. A call while closed is a no-op.
    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError>;

    /// Write a text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Current ready state.
    fn ready_state(&self) -> ReadyState;
}

/// Builds transports bound to an endpoint.
pub trait TransportFactory: Send + Sync + 'static {
    /// Construct a new, unconnected transport reporting through `events`.
    fn create(&self, endpoint: &str, events: TransportEvents) -> Box<dyn Transport>;
}
