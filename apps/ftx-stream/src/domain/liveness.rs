//! Liveness Policy
//!
//! Pure decision table behind the watchdog. Given how long the transport has
//! been silent, decide whether to leave it alone, bounce the existing
//! transport, or throw it away and build a new one.
//!
//! A soft reconnect is issued at most once per silence period: the caller
//! passes `soft_attempted = true` after performing one, and resets it when
//! any frame or open notification arrives.

use std::time::Duration;

/// Default interval between watchdog ticks.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Default silence after which the transport is bounced.
pub const DEFAULT_RECONNECT_THRESHOLD: Duration = Duration::from_secs(60);

/// Default silence after which the transport is recreated.
pub const DEFAULT_RENEW_THRESHOLD: Duration = Duration::from_secs(120);

/// Action chosen by a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Connection is healthy, or the soft reconnect for this silence period
    /// already happened.
    None,
    /// Close and reconnect the existing transport.
    SoftReconnect,
    /// Discard the transport and build a new one.
    HardReinitialize,
}

/// Silence thresholds driving the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    reconnect_threshold: Duration,
    renew_threshold: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            reconnect_threshold: DEFAULT_RECONNECT_THRESHOLD,
            renew_threshold: DEFAULT_RENEW_THRESHOLD,
        }
    }
}

impl LivenessPolicy {
    /// Create a policy.
    ///
    /// Returns `None` unless `reconnect_threshold < renew_threshold`.
    #[must_use]
    pub fn new(reconnect_threshold: Duration, renew_threshold: Duration) -> Option<Self> {
        (reconnect_threshold < renew_threshold).then_some(Self {
            reconnect_threshold,
            renew_threshold,
        })
    }

    /// Silence after which a soft reconnect is issued.
    #[must_use]
    pub const fn reconnect_threshold(&self) -> Duration {
        self.reconnect_threshold
    }

    /// Silence after which the transport is recreated.
    #[must_use]
    pub const fn renew_threshold(&self) -> Duration {
        self.renew_threshold
    }

    /// Decide what a tick should do after `elapsed` of silence.
    #[must_use]
    pub fn evaluate(&self, elapsed: Duration, soft_attempted: bool) -> WatchdogAction {
        if elapsed > self.renew_threshold {
            WatchdogAction::HardReinitialize
        } else if elapsed > self.reconnect_threshold && !soft_attempted {
            WatchdogAction::SoftReconnect
        } else {
            WatchdogAction::None
        }
    }
}
