//! Transport Adapters
//!
//! `tokio-tungstenite` implementation of the [`Transport`] port.
//!
//! [`Transport`]: crate::application::ports::Transport

pub mod ws;

pub use ws::{WsTransport, WsTransportFactory};
