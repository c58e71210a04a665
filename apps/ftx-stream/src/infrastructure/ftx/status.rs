//! Shared connection status, readable from any task while the supervisor
//! owns the connection.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::domain::connection::SupervisorState;

/// Live counters and state of one supervised connection.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    state: parking_lot::RwLock<SupervisorState>,
    last_opened_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    generation: AtomicU64,
    messages_received: AtomicU64,
    decode_errors: AtomicU64,
    soft_reconnects: AtomicU64,
    reinitializations: AtomicU64,
    sends_dropped: AtomicU64,
}

impl ConnectionStatus {
    /// Create a status in the `Uninitialized` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_state(&self, state: SupervisorState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
        if state == SupervisorState::Open && previous != SupervisorState::Open {
            *self.last_opened_at.write() = Some(Utc::now());
        }
    }

    pub(crate) fn set_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::Relaxed);
    }

    pub(crate) fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_soft_reconnects(&self) {
        self.soft_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_reinitializations(&self) {
        self.reinitializations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_sends_dropped(&self) {
        self.sends_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current supervisor state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    /// Take a consistent-enough copy of all fields.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            last_opened_at: *self.last_opened_at.read(),
            generation: self.generation.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            soft_reconnects: self.soft_reconnects.load(Ordering::Relaxed),
            reinitializations: self.reinitializations.load(Ordering::Relaxed),
            sends_dropped: self.sends_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ConnectionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Supervisor state.
    pub state: SupervisorState,
    /// When the transport last opened.
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Current transport generation (1 after the first initialize).
    pub generation: u64,
    /// Frames received while message delivery was attached.
    pub messages_received: u64,
    /// Frames that failed to decode.
    pub decode_errors: u64,
    /// Soft reconnects performed by the watchdog.
    pub soft_reconnects: u64,
    /// Hard re-initializations performed by the watchdog.
    pub reinitializations: u64,
    /// Writes dropped because the transport was not open.
    pub sends_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let status = ConnectionStatus::new();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.state, SupervisorState::Uninitialized);
        assert!(snapshot.last_opened_at.is_none());
        assert_eq!(snapshot.generation, 0);
    }

    #[test]
    fn opening_records_timestamp() {
        let status = ConnectionStatus::new();
        status.set_state(SupervisorState::Connecting);
        assert!(status.snapshot().last_opened_at.is_none());

        status.set_state(SupervisorState::Open);
        assert!(status.snapshot().last_opened_at.is_some());
    }

    #[test]
    fn counters_increment() {
        let status = ConnectionStatus::new();
        status.increment_messages();
        status.increment_messages();
        status.increment_decode_errors();
        status.increment_sends_dropped();

        let snapshot = status.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.sends_dropped, 1);
    }
}
