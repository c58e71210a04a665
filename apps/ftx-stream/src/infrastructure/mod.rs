//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the FTX protocol adapters, the supervisor that drives
//! them, and the concrete implementation of the transport port.

/// FTX protocol, connection supervisor and client facade.
pub mod ftx;

/// WebSocket transport adapter.
pub mod transport;

/// Broadcast hub for stream events.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
