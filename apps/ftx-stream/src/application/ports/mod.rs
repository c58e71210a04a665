//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: one WebSocket connection (connect, close, send)
//! - `TransportFactory`: builds a fresh transport bound to an endpoint
//!
//! A transport reports back through [`TransportEvents`], the Rust form of
//! the open / error / message callbacks. Every transport instance gets its
//! own event channel; dropping the receiving end detaches all callbacks.

mod transport;

pub use transport::{
    Transport, TransportError, TransportEvent, TransportEvents, TransportFactory,
};
