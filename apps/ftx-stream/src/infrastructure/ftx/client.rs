//! FTX Stream Client
//!
//! Public facade over the supervisor task. Every operation is a command sent
//! to the supervisor and answered over a oneshot channel; the client holds no
//! connection state of its own.
//!
//! Request builders format the control messages without sending them, so
//! callers can log or batch them.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::auth::Credentials;
use super::codec::{CodecError, FrameCodec};
use super::status::ConnectionStatus;
use super::supervisor::{Command, SendOutcome, Supervisor, SupervisorConfig, SupervisorError};
use crate::application::ports::TransportFactory;
use crate::infrastructure::broadcast::{EventHub, EventHubConfig, SharedEventHub, StreamEvent};

/// Default capacity of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

// =============================================================================
// Error Type
// =============================================================================

/// Errors returned by [`FtxStreamClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The supervisor task has stopped.
    #[error("supervisor task is not running")]
    SupervisorGone,

    /// The supervisor reported a failure.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// An outbound payload could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`FtxStreamClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Supervisor timings and endpoint.
    pub supervisor: SupervisorConfig,
    /// Event hub capacity.
    pub events: EventHubConfig,
    /// Capacity of the command channel.
    pub command_capacity: Option<usize>,
}

impl ClientConfig {
    /// Create a configuration for `endpoint` with default timings.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            supervisor: SupervisorConfig::new(endpoint),
            ..Self::default()
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Handle to one supervised FTX stream connection.
///
/// Dropping the client cancels the supervisor, which closes the transport.
///
/// # Example
///
/// ```rust,ignore
/// let client = FtxStreamClient::new(ClientConfig::default(), Arc::new(WsTransportFactory::new()));
/// let mut events = client.events();
///
/// client.connect(true).await?;
/// client.subscribe_market("orderbook", "BTC-PERP").await?;
///
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct FtxStreamClient {
    commands: mpsc::Sender<Command>,
    hub: SharedEventHub,
    status: Arc<ConnectionStatus>,
    codec: FrameCodec,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FtxStreamClient {
    /// Create a client and spawn its supervisor on the current runtime.
    ///
    /// The first transport is built immediately but not connected.
    #[must_use]
    pub fn new(config: ClientConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let hub = Arc::new(EventHub::new(config.events));
        Self::with_hub(config, factory, hub, &CancellationToken::new())
    }

    /// Create a client publishing into an existing hub, stopped when
    /// `cancel` fires.
    #[must_use]
    pub fn with_hub(
        config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
        hub: SharedEventHub,
        cancel: &CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let status = Arc::new(ConnectionStatus::new());
        let (commands, rx) = mpsc::channel(
            config
                .command_capacity
                .unwrap_or(DEFAULT_COMMAND_CAPACITY)
                .max(1),
        );

        let supervisor = Supervisor::new(
            config.supervisor,
            factory,
            Arc::clone(&hub),
            Arc::clone(&status),
            cancel.clone(),
        );
        let task = tokio::spawn(supervisor.run(rx));

        Self {
            commands,
            hub,
            status,
            codec: FrameCodec::new(),
            cancel,
            task: Some(task),
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect, starting the watchdog when `auto_reconnect` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to connect in time. With
    /// `auto_reconnect` the watchdog keeps retrying regardless.
    pub async fn connect(&self, auto_reconnect: bool) -> Result<(), ClientError> {
        self.request(|reply| Command::Connect {
            auto_reconnect,
            reply,
        })
        .await
    }

    /// Stop the watchdog, stop message delivery and close the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. The client is
    /// considered disconnected either way.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Write a raw text payload if the transport is open.
    ///
    /// # Errors
    ///
    /// Returns an error if the write itself fails. Writing while closed is
    /// not an error and yields [`SendOutcome::Dropped`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<SendOutcome, ClientError> {
        let text = text.into();
        self.request(|reply| Command::Send { text, reply }).await
    }

    /// Serialize `value` as JSON and write it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<SendOutcome, ClientError> {
        let text = self.codec.encode(value)?;
        self.send_text(text).await
    }

    /// Send a signed login request.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<SendOutcome, ClientError> {
        self.send_text(self.auth_request(credentials)).await
    }

    /// Subscribe to a channel that takes no market.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn subscribe(&self, channel: &str) -> Result<SendOutcome, ClientError> {
        self.send_text(self.subscribe_request(channel)).await
    }

    /// Subscribe to a channel for one market.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn subscribe_market(
        &self,
        channel: &str,
        market: &str,
    ) -> Result<SendOutcome, ClientError> {
        self.send_text(Self::subscribe_market_request(channel, market))
            .await
    }

    /// Unsubscribe from a channel that takes no market.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn unsubscribe(&self, channel: &str) -> Result<SendOutcome, ClientError> {
        self.send_text(self.unsubscribe_request(channel)).await
    }

    /// Unsubscribe from a channel for one market.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn unsubscribe_market(
        &self,
        channel: &str,
        market: &str,
    ) -> Result<SendOutcome, ClientError> {
        self.send_text(Self::unsubscribe_market_request(channel, market))
            .await
    }

    // =========================================================================
    // Request Builders
    // =========================================================================

    /// Build a login request signed with the current time.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn auth_request(&self, credentials: &Credentials) -> String {
        credentials.login_request()
    }

    /// Build a subscribe request for a channel without a market.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn subscribe_request(&self, channel: &str) -> String {
        FrameCodec::subscribe(channel)
    }

    /// Build an unsubscribe request for a channel without a market.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn unsubscribe_request(&self, channel: &str) -> String {
        FrameCodec::unsubscribe(channel)
    }

    /// Build a subscribe request for a channel and market.
    #[must_use]
    pub fn subscribe_market_request(channel: &str, market: &str) -> String {
        FrameCodec::subscribe_market(channel, market)
    }

    /// Build an unsubscribe request for a channel and market.
    #[must_use]
    pub fn unsubscribe_market_request(channel: &str, market: &str) -> String {
        FrameCodec::unsubscribe_market(channel, market)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Register a new event receiver.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StreamEvent> {
        self.hub.subscribe()
    }

    /// Get the hub events are published to.
    #[must_use]
    pub fn hub(&self) -> &SharedEventHub {
        &self.hub
    }

    /// Get the live connection status.
    #[must_use]
    pub fn status(&self) -> &Arc<ConnectionStatus> {
        &self.status
    }

    /// Stop the supervisor and wait for it to close the transport.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Supervisor task ended abnormally");
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T, SupervisorError>>) -> Command,
    ) -> Result<T, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ClientError::SupervisorGone)?;
        let result = rx.await.map_err(|_| ClientError::SupervisorGone)?;
        Ok(result?)
    }
}

impl Drop for FtxStreamClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for FtxStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtxStreamClient")
            .field("state", &self.status.state())
            .field("receivers", &self.hub.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn market_request_builders() {
        assert_eq!(
            json(&FtxStreamClient::subscribe_market_request("orderbook", "BTC/USD")),
            json(r#"{"op": "subscribe", "channel": "orderbook", "market": "BTC/USD"}"#)
        );
        assert_eq!(
            json(&FtxStreamClient::unsubscribe_market_request("trades", "ETH-PERP")),
            json(r#"{"op": "unsubscribe", "channel": "trades", "market": "ETH-PERP"}"#)
        );
    }

    #[test]
    fn default_config_uses_public_endpoint() {
        let config = ClientConfig::default();
        assert_eq!(config.supervisor.endpoint, "wss://ftx.com/ws/");
        assert_eq!(config.events.capacity, 10_000);
        assert!(config.command_capacity.is_none());
    }
}
