//! Connection Supervisor
//!
//! Owns the transport, the watchdog and the reconnect policy. All of them
//! live on a single task: commands from the client, transport events and
//! watchdog ticks are taken one at a time from a `tokio::select!`, so a tick
//! that is busy closing and reconnecting can never interleave with a frame
//! callback or a send.
//!
//! # Watchdog
//!
//! Every `watchdog_interval` the supervisor measures the silence since the
//! last inbound frame or open notification and asks the [`LivenessPolicy`]:
//!
//! - silence ≤ reconnect threshold: nothing to do
//! - reconnect threshold < silence ≤ renew threshold: close and reconnect
//!   the same transport, once per silence period
//! - silence > renew threshold: drop the transport and all its callbacks,
//!   build a new one, connect it
//!
//! A failing tick is logged and retried on the next interval. Transport
//! errors never trigger a reconnect by themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::DEFAULT_ENDPOINT;
use super::codec::FrameCodec;
use super::status::ConnectionStatus;
use crate::application::ports::{
    Transport, TransportError, TransportEvent, TransportEvents, TransportFactory,
};
use crate::domain::connection::{CloseCode, ReadyState, SupervisorState};
use crate::domain::frame::Frame;
use crate::domain::liveness::{DEFAULT_WATCHDOG_INTERVAL, LivenessPolicy, WatchdogAction};
use crate::infrastructure::broadcast::{SharedEventHub, StreamEvent};
use crate::infrastructure::metrics::{self, ReconnectKind};

/// Pause between close and connect during a soft reconnect.
pub const DEFAULT_RECONNECT_PAUSE: Duration = Duration::from_millis(100);

/// Upper bound on a single connect or close call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered transport events per generation.
pub const DEFAULT_TRANSPORT_EVENT_CAPACITY: usize = 1024;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the supervisor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SupervisorError {
    /// No transport exists.
    #[error("transport has not been initialized")]
    NotInitialized,

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A transport call did not complete in time.
    #[error("transport {op} timed out after {limit:?}")]
    Timeout {
        /// Operation that hung.
        op: &'static str,
        /// Configured limit.
        limit: Duration,
    },
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// WebSocket URL.
    pub endpoint: String,
    /// Interval between watchdog ticks.
    pub watchdog_interval: Duration,
    /// Silence thresholds.
    pub liveness: LivenessPolicy,
    /// Pause between close and connect during a soft reconnect.
    pub reconnect_pause: Duration,
    /// Upper bound on a single transport call.
    pub io_timeout: Duration,
    /// Interval between keepalive pings (`None` = never ping).
    pub keepalive_interval: Option<Duration>,
    /// Buffered transport events per generation.
    pub transport_event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            liveness: LivenessPolicy::default(),
            reconnect_pause: DEFAULT_RECONNECT_PAUSE,
            io_timeout: DEFAULT_IO_TIMEOUT,
            keepalive_interval: None,
            transport_event_capacity: DEFAULT_TRANSPORT_EVENT_CAPACITY,
        }
    }
}

impl SupervisorConfig {
    /// Create a configuration for `endpoint` with default timings.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Result of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The payload was written to an open transport.
    Sent,
    /// The transport was not open; nothing was written.
    Dropped,
}

impl SendOutcome {
    /// Whether the payload was written.
    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

type Reply<T> = oneshot::Sender<Result<T, SupervisorError>>;

/// Requests handled by the supervisor task.
#[derive(Debug)]
pub enum Command {
    /// Attach message delivery and connect.
    Connect {
        /// Whether to run the watchdog.
        auto_reconnect: bool,
        /// Completion.
        reply: Reply<()>,
    },
    /// Stop the watchdog, detach message delivery and close.
    Disconnect {
        /// Completion.
        reply: Reply<()>,
    },
    /// Write a text payload if the transport is open.
    Send {
        /// Payload.
        text: String,
        /// Outcome.
        reply: Reply<SendOutcome>,
    },
}

// =============================================================================
// Supervisor
// =============================================================================

/// One transport generation and everything bound to it.
struct Connection {
    transport: Box<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    events_open: bool,
    generation: u64,
    last_received_at: Instant,
    auto_reconnect: bool,
    message_attached: bool,
}

enum Step {
    Shutdown,
    Command(Option<Command>),
    Transport(Option<TransportEvent>),
    WatchdogTick,
    KeepaliveTick,
}

/// Single-task owner of the connection lifecycle.
pub struct Supervisor {
    config: SupervisorConfig,
    factory: Arc<dyn TransportFactory>,
    hub: SharedEventHub,
    status: Arc<ConnectionStatus>,
    codec: FrameCodec,
    cancel: CancellationToken,
    connection: Option<Connection>,
    generation: u64,
    watchdog: Option<Interval>,
    keepalive: Option<Interval>,
    soft_attempted: bool,
}

impl Supervisor {
    /// Create a supervisor. Nothing happens until [`Supervisor::run`].
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        factory: Arc<dyn TransportFactory>,
        hub: SharedEventHub,
        status: Arc<ConnectionStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            factory,
            hub,
            status,
            codec: FrameCodec::new(),
            cancel,
            connection: None,
            generation: 0,
            watchdog: None,
            keepalive: None,
            soft_attempted: false,
        }
    }

    /// Initialize the first transport and process commands, transport events
    /// and watchdog ticks until cancelled or every command sender is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.initialize();

        loop {
            let step = tokio::select! {
                () = self.cancel.cancelled() => Step::Shutdown,
                command = commands.recv() => Step::Command(command),
                event = next_event(self.connection.as_mut()) => Step::Transport(event),
                () = next_tick(self.watchdog.as_mut()) => Step::WatchdogTick,
                () = next_tick(self.keepalive.as_mut()) => Step::KeepaliveTick,
            };

            match step {
                Step::Shutdown | Step::Command(None) => break,
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Transport(Some(event)) => self.handle_transport_event(event),
                Step::Transport(None) => {
                    if let Some(connection) = self.connection.as_mut() {
                        tracing::debug!(
                            generation = connection.generation,
                            "Transport dropped its event sender"
                        );
                        connection.events_open = false;
                    }
                }
                Step::WatchdogTick => self.on_watchdog_tick().await,
                Step::KeepaliveTick => self.on_keepalive_tick().await,
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                auto_reconnect,
                reply,
            } => {
                let result = self.connect(auto_reconnect).await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                let result = self.disconnect().await;
                let _ = reply.send(result);
            }
            Command::Send { text, reply } => {
                let result = self.send(text).await;
                let _ = reply.send(result);
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Build a fresh transport with its own event channel.
    fn initialize(&mut self) {
        let state = self.status.state();
        if !state.can_initialize() {
            tracing::debug!(%state, "Initialize skipped");
            return;
        }

        self.generation += 1;
        let (tx, rx) = mpsc::channel(self.config.transport_event_capacity.max(1));
        let transport = self.factory.create(
            &self.config.endpoint,
            TransportEvents::new(self.generation, tx),
        );

        self.connection = Some(Connection {
            transport,
            events: rx,
            events_open: true,
            generation: self.generation,
            last_received_at: Instant::now(),
            auto_reconnect: false,
            message_attached: false,
        });
        self.soft_attempted = false;
        self.status.set_generation(self.generation);
        self.status.set_state(SupervisorState::Initialized);

        tracing::debug!(
            generation = self.generation,
            endpoint = %self.config.endpoint,
            "Transport initialized"
        );
    }

    /// Discard the transport. Dropping its event receiver detaches every
    /// callback, so late events from the old generation go nowhere.
    fn uninitialize(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!(generation = connection.generation, "Transport discarded");
        }
        self.status.set_state(SupervisorState::Closed);
    }

    async fn connect(&mut self, auto_reconnect: bool) -> Result<(), SupervisorError> {
        let io_timeout = self.config.io_timeout;
        let connection = self
            .connection
            .as_mut()
            .ok_or(SupervisorError::NotInitialized)?;
        connection.message_attached = true;
        connection.auto_reconnect = auto_reconnect;
        let generation = connection.generation;
        let already_active = connection.transport.ready_state().is_active();

        if auto_reconnect {
            self.start_watchdog();
        } else {
            self.watchdog = None;
        }
        self.start_keepalive();

        if already_active {
            tracing::debug!(generation, "Connect ignored, transport already active");
            return Ok(());
        }

        tracing::info!(generation, endpoint = %self.config.endpoint, "Connecting to FTX stream");
        self.status.set_state(SupervisorState::Connecting);

        let connection = self
            .connection
            .as_mut()
            .ok_or(SupervisorError::NotInitialized)?;
        let result = bounded(io_timeout, "connect", connection.transport.connect()).await;
        self.sync_state();
        result
    }

    async fn disconnect(&mut self) -> Result<(), SupervisorError> {
        self.watchdog = None;
        self.keepalive = None;

        let io_timeout = self.config.io_timeout;
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        connection.message_attached = false;

        if connection.transport.ready_state() == ReadyState::Closed {
            self.status.set_state(SupervisorState::Closed);
            return Ok(());
        }

        tracing::info!(generation = connection.generation, "Disconnecting from FTX stream");
        self.status.set_state(SupervisorState::Closing);
        let result = bounded(
            io_timeout,
            "close",
            connection.transport.close(CloseCode::Normal),
        )
        .await;

        self.status.set_state(SupervisorState::Closed);
        metrics::set_connection_open(false);
        result
    }

    async fn send(&mut self, text: String) -> Result<SendOutcome, SupervisorError> {
        let io_timeout = self.config.io_timeout;
        let Some(connection) = self
            .connection
            .as_mut()
            .filter(|connection| connection.transport.ready_state().is_open())
        else {
            tracing::debug!(bytes = text.len(), "Send dropped, transport not open");
            self.status.increment_sends_dropped();
            metrics::record_send(false);
            return Ok(SendOutcome::Dropped);
        };

        bounded(io_timeout, "send", connection.transport.send(text)).await?;
        metrics::record_send(true);
        Ok(SendOutcome::Sent)
    }

    async fn shutdown(&mut self) {
        tracing::info!(generation = self.generation, "Supervisor shutting down");
        if let Err(e) = self.disconnect().await {
            tracing::warn!(error = %e, "Close during shutdown failed");
        }
        self.connection = None;
    }

    fn start_watchdog(&mut self) {
        let period = self.config.watchdog_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.watchdog = Some(interval);
    }

    fn start_keepalive(&mut self) {
        self.keepalive = self.config.keepalive_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
    }

    /// Mirror the transport's ready state into the shared status.
    fn sync_state(&self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        let state = match connection.transport.ready_state() {
            ReadyState::Closed => SupervisorState::Closed,
            ReadyState::Connecting => SupervisorState::Connecting,
            ReadyState::Open => SupervisorState::Open,
            ReadyState::Closing => SupervisorState::Closing,
        };
        self.status.set_state(state);
        metrics::set_connection_open(state == SupervisorState::Open);
    }

    // =========================================================================
    // Transport Events
    // =========================================================================

    fn handle_transport_event(&mut self, event: TransportEvent) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let generation = connection.generation;

        match event {
            TransportEvent::Opened => {
                connection.last_received_at = Instant::now();
                self.soft_attempted = false;
                tracing::debug!(generation, "WebSocket opened");
                self.sync_state();
                self.hub.publish(StreamEvent::Opened { generation });
            }
            TransportEvent::Message(frame) => {
                if !connection.message_attached {
                    tracing::trace!(generation, "Frame ignored, message delivery detached");
                    return;
                }
                // Liveness is "the transport is talking", decoded or not.
                connection.last_received_at = Instant::now();
                self.soft_attempted = false;
                self.on_frame(generation, frame);
            }
            TransportEvent::Error(message) => {
                tracing::error!(generation, error = %message, "WebSocket error");
                self.hub.publish(StreamEvent::TransportError(message));
            }
            TransportEvent::Closed => {
                tracing::info!(generation, "WebSocket closed");
                self.sync_state();
                self.hub.publish(StreamEvent::Closed { generation });
            }
        }
    }

    fn on_frame(&self, generation: u64, frame: Frame) {
        let binary = frame.is_binary();
        metrics::record_frame_received(binary);
        self.status.increment_messages();

        match self.codec.decode(frame) {
            Ok(text) => {
                self.hub.publish(StreamEvent::Message(text));
            }
            Err(e) => {
                tracing::warn!(generation, binary, error = %e, "Dropping undecodable frame");
                self.status.increment_decode_errors();
                metrics::record_decode_error();
                self.hub.publish(StreamEvent::DecodeError {
                    generation,
                    reason: e.to_string(),
                });
            }
        }
    }

    // =========================================================================
    // Watchdog
    // =========================================================================

    async fn on_watchdog_tick(&mut self) {
        let Some((generation, silence)) = self
            .connection
            .as_ref()
            .map(|connection| (connection.generation, connection.last_received_at.elapsed()))
        else {
            return;
        };

        let action = self.config.liveness.evaluate(silence, self.soft_attempted);
        let result = match action {
            WatchdogAction::None => return,
            WatchdogAction::SoftReconnect => self.soft_reconnect(generation, silence).await,
            WatchdogAction::HardReinitialize => self.hard_reinitialize(generation, silence).await,
        };

        if let Err(e) = result {
            metrics::record_watchdog_failure();
            tracing::error!(
                generation,
                ?action,
                error = %e,
                "Watchdog reconnect failed, retrying on next tick"
            );
        }
    }

    async fn soft_reconnect(
        &mut self,
        generation: u64,
        silence: Duration,
    ) -> Result<(), SupervisorError> {
        self.soft_attempted = true;
        tracing::info!(generation, silence_secs = silence.as_secs(), "WebSocket reconnecting...");
        self.status.increment_soft_reconnects();
        metrics::record_reconnect(ReconnectKind::Soft);
        self.hub.publish(StreamEvent::Reconnecting { generation });

        let io_timeout = self.config.io_timeout;
        let pause = self.config.reconnect_pause;
        let connection = self
            .connection
            .as_mut()
            .ok_or(SupervisorError::NotInitialized)?;

        self.status.set_state(SupervisorState::Closing);
        if let Err(e) = bounded(
            io_timeout,
            "close",
            connection.transport.close(CloseCode::Normal),
        )
        .await
        {
            tracing::warn!(
                generation,
                error = %e,
                "Close failed during reconnect, connecting anyway"
            );
        }

        tokio::time::sleep(pause).await;
        self.status.set_state(SupervisorState::Connecting);
        let result = bounded(io_timeout, "connect", connection.transport.connect()).await;

        self.sync_state();
        result
    }

    async fn hard_reinitialize(
        &mut self,
        generation: u64,
        silence: Duration,
    ) -> Result<(), SupervisorError> {
        tracing::info!(generation, silence_secs = silence.as_secs(), "WebSocket re-initialize...");
        self.status.increment_reinitializations();
        metrics::record_reconnect(ReconnectKind::Hard);

        let auto_reconnect = self
            .connection
            .as_ref()
            .is_none_or(|connection| connection.auto_reconnect);

        if let Err(e) = self.disconnect().await {
            tracing::warn!(
                generation,
                error = %e,
                "Close failed during re-initialize, discarding transport anyway"
            );
        }
        self.uninitialize();
        self.initialize();
        self.hub.publish(StreamEvent::Reinitialized {
            generation: self.generation,
        });

        self.connect(auto_reconnect).await
    }

    async fn on_keepalive_tick(&mut self) {
        let open = self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.transport.ready_state().is_open());
        if !open {
            return;
        }
        if let Err(e) = self.send(FrameCodec::ping()).await {
            tracing::warn!(error = %e, "Keepalive ping failed");
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn next_event(connection: Option<&mut Connection>) -> Option<TransportEvent> {
    match connection {
        Some(connection) if connection.events_open => connection.events.recv().await,
        _ => std::future::pending().await,
    }
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Run a transport call with an upper bound on its duration.
async fn bounded<T>(
    limit: Duration,
    op: &'static str,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, SupervisorError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SupervisorError::Timeout { op, limit })?
        .map_err(SupervisorError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounded_passes_through_results() {
        let ok = bounded(Duration::from_secs(1), "connect", async { Ok::<_, TransportError>(7) });
        assert_eq!(ok.await.unwrap(), 7);

        let err = bounded(Duration::from_secs(1), "send", async {
            Err::<(), _>(TransportError::NotConnected)
        })
        .await;
        assert!(matches!(
            err,
            Err(SupervisorError::Transport(TransportError::NotConnected))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out_hung_calls() {
        let result = bounded(
            Duration::from_secs(10),
            "close",
            std::future::pending::<Result<(), TransportError>>(),
        )
        .await;
        assert!(matches!(
            result,
            Err(SupervisorError::Timeout { op: "close", .. })
        ));
    }

    #[test]
    fn default_config_values() {
        let config = SupervisorConfig::default();
        assert_eq!(config.endpoint, "wss://ftx.com/ws/");
        assert_eq!(config.watchdog_interval, Duration::from_secs(5));
        assert_eq!(config.liveness.reconnect_threshold(), Duration::from_secs(60));
        assert_eq!(config.liveness.renew_threshold(), Duration::from_secs(120));
        assert_eq!(config.reconnect_pause, Duration::from_millis(100));
        assert!(config.keepalive_interval.is_none());
    }

    #[test]
    fn send_outcome_is_sent() {
        assert!(SendOutcome::Sent.is_sent());
        assert!(!SendOutcome::Dropped.is_sent());
    }
}
