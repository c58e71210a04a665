//! Broadcast Event Hub
//!
//! Fans decoded stream events out to any number of consumers using a tokio
//! broadcast channel.
//!
//! # Delivery
//!
//! - Every receiver sees events in the order the supervisor published them.
//! - Publishing never waits on a receiver. A receiver that falls more than
//!   `capacity` events behind gets `RecvError::Lagged` and resumes from the
//!   oldest retained event.
//! - Publishing with no receivers is allowed and simply discards the event.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::infrastructure::metrics;

// =============================================================================
// Stream Events
// =============================================================================

/// Events delivered to consumers of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The transport opened (initial connect or any reconnect).
    Opened {
        /// Transport generation that opened.
        generation: u64,
    },
    /// A decoded application message.
    Message(String),
    /// An inbound frame could not be decoded and was skipped.
    DecodeError {
        /// Transport generation that delivered the frame.
        generation: u64,
        /// Decoder error description.
        reason: String,
    },
    /// The watchdog bounced the existing transport after silence.
    Reconnecting {
        /// Transport generation being reconnected.
        generation: u64,
    },
    /// The watchdog replaced the transport with a new one.
    Reinitialized {
        /// Generation of the replacement transport.
        generation: u64,
    },
    /// The transport reported an error. The watchdog decides what to do.
    TransportError(String),
    /// The transport closed.
    Closed {
        /// Transport generation that closed.
        generation: u64,
    },
}

impl StreamEvent {
    /// Short label for logging and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::Message(_) => "message",
            Self::DecodeError { .. } => "decode_error",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Reinitialized { .. } => "reinitialized",
            Self::TransportError(_) => "transport_error",
            Self::Closed { .. } => "closed",
        }
    }
}

// =============================================================================
// Event Hub
// =============================================================================

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Configuration for the event hub.
#[derive(Debug, Clone, Copy)]
pub struct EventHubConfig {
    /// Events retained for slow receivers.
    pub capacity: usize,
}

impl Default for EventHubConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Single ordered broadcast point for stream events.
///
/// # Example
///
/// ```rust
/// use ftx_stream::infrastructure::broadcast::{EventHub, EventHubConfig, StreamEvent};
///
/// let hub = EventHub::new(EventHubConfig::default());
/// let mut rx = hub.subscribe();
///
/// let _ = hub.publish(StreamEvent::Message("{}".to_string()));
/// assert_eq!(rx.try_recv().unwrap(), StreamEvent::Message("{}".to_string()));
/// ```
#[derive(Debug)]
pub struct EventHub {
    tx: broadcast::Sender<StreamEvent>,
}

impl EventHub {
    /// Create a new event hub.
    #[must_use]
    pub fn new(config: EventHubConfig) -> Self {
        Self {
            tx: broadcast::channel(config.capacity.max(1)).0,
        }
    }

    /// Create a new event hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EventHubConfig::default())
    }

    /// Publish an event to all receivers.
    ///
    /// Returns the number of receivers that will see the event, or `None`
    /// if there are no active receivers.
    pub fn publish(&self, event: StreamEvent) -> Option<usize> {
        let kind = event.kind();
        let delivered = self.tx.send(event).ok();
        if delivered.is_none() {
            tracing::trace!(kind, "No consumers for stream event");
        }
        metrics::record_event_published(kind);
        delivered
    }

    /// Register a new receiver. It sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get statistics about the hub.
    #[must_use]
    pub fn stats(&self) -> EventHubStats {
        EventHubStats {
            receivers: self.receiver_count(),
            queued: self.tx.len(),
        }
    }
}

/// Shared event hub reference.
pub type SharedEventHub = Arc<EventHub>;

/// Statistics about the event hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventHubStats {
    /// Number of active receivers.
    pub receivers: usize,
    /// Events retained for the slowest receiver.
    pub queued: usize,
}

// =============================================================================
// Tests
// =============================================================================
