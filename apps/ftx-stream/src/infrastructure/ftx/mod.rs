//! FTX Protocol Adapters
//!
//! - **auth**: credentials and the `login` signature
//! - **codec**: control message framing and inbound frame decoding
//! - **supervisor**: the task that owns the transport and the watchdog
//! - **client**: public facade over the supervisor
//! - **status**: connection state and counters shared with the client

pub mod auth;
pub mod client;
pub mod codec;
pub mod status;
pub mod supervisor;

pub use auth::{AuthError, Credentials, sign};
pub use client::{ClientConfig, ClientError, FtxStreamClient};
pub use codec::{CodecError, FrameCodec, compress, decompress};
pub use status::{ConnectionStatus, StatusSnapshot};
pub use supervisor::{SendOutcome, SupervisorConfig, SupervisorError};

/// Default public endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://ftx.com/ws/";
