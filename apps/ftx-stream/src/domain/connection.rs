//! Connection States
//!
//! The transport reports a [`ReadyState`]; the supervisor tracks the wider
//! [`SupervisorState`] which also covers the time before a transport exists
//! and the re-initialize loop.
//!
//! ```text
//! Uninitialized ─► Initialized ─► Connecting ─► Open ─► Closing ─► Closed
//!                       ▲                                            │
//!                       └──────────────── re-initialize ─────────────┘
//! ```

use std::fmt;

/// Ready state of a single transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    /// Not connected.
    #[default]
    Closed,
    /// Handshake in progress.
    Connecting,
    /// Connected; writes are accepted.
    Open,
    /// Close handshake in progress.
    Closing,
}

impl ReadyState {
    /// Whether writes may be issued.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a connect call would be a no-op.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Lifecycle state of the connection supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    /// No transport has been constructed yet.
    #[default]
    Uninitialized,
    /// A fresh transport exists but has not been connected.
    Initialized,
    /// Connect issued, waiting for the open notification.
    Connecting,
    /// Transport is open.
    Open,
    /// Close issued.
    Closing,
    /// Transport is closed.
    Closed,
}

impl SupervisorState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Whether `initialize()` may build a new transport from this state.
    #[must_use]
    pub const fn can_initialize(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Closed)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WebSocket close status code sent with a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000: normal closure.
    Normal,
}

impl CloseCode {
    /// Numeric status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
        }
    }
}
