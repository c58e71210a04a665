#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! FTX Stream - Self-healing WebSocket client
//!
//! Maintains one logical subscription session to the FTX push API over an
//! unreliable WebSocket. A watchdog bounces the connection after a period of
//! silence and rebuilds it from scratch after a longer one; decoded frames
//! are fanned out to any number of consumers in arrival order.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and policies
//!   - `clock`: Epoch time conversions
//!   - `connection`: Transport and supervisor states
//!   - `liveness`: Watchdog decision table
//!
//! - **Application**: Port definitions
//!   - `ports`: The transport capability and its event channel
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `ftx`: Login signature, frame codec, supervisor, client facade
//!   - `transport`: `tokio-tungstenite` transport
//!   - `broadcast`: Event fan-out
//!   - `config`: Environment configuration for the binary
//!
//! # Data Flow
//!
//! ```text
//!                 commands                      frames
//! FtxStreamClient ────────► Supervisor ◄──────────────── WsTransport ◄── wss://ftx.com/ws/
//!                               │  ▲
//!                   StreamEvent │  │ watchdog tick
//!                               ▼  │
//!                           EventHub ──► Consumer 1
//!                                    ──► Consumer N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure connection types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::clock::{millis_since_epoch, now_millis, seconds_since_epoch};
pub use domain::connection::{CloseCode, ReadyState, SupervisorState};
pub use domain::frame::Frame;
pub use domain::liveness::{LivenessPolicy, WatchdogAction};

// Ports (for custom transports and test doubles)
pub use application::ports::{
    Transport, TransportError, TransportEvent, TransportEvents, TransportFactory,
};

// FTX client
pub use infrastructure::ftx::{
    AuthError, ClientConfig, ClientError, CodecError, ConnectionStatus, Credentials,
    DEFAULT_ENDPOINT, FrameCodec, FtxStreamClient, SendOutcome, StatusSnapshot, SupervisorConfig,
    SupervisorError, sign,
};

// Transport
pub use infrastructure::transport::{WsTransport, WsTransportFactory};

// Broadcast hub
pub use infrastructure::broadcast::{
    EventHub, EventHubConfig, EventHubStats, SharedEventHub, StreamEvent,
};

// Config
pub use infrastructure::config::{AppConfig, ChannelSpec, ConfigError};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
