//! Domain Layer - Core connection types and liveness policy.
//!
//! This layer contains the pure types of the streaming client with no I/O:
//! epoch time conversion, connection states and the watchdog decision table.

/// Epoch time conversions.
pub mod clock;

/// Connection and transport states.
pub mod connection;

/// Watchdog liveness policy.
pub mod liveness;

/// Inbound transport frames.
pub mod frame;
