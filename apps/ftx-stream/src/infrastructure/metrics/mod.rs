//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames by encoding, decode failures
//! - **Events**: events published to consumers by kind
//! - **Liveness**: soft reconnects, re-initializations, watchdog failures
//! - **Sends**: outbound writes sent or dropped
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! library can be used without exporting anything.

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter
// =============================================================================

static EXPORTER_INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime. Subsequent calls are no-ops.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if EXPORTER_INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    let _ = EXPORTER_INSTALLED.set(addr);
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "ftx_stream_frames_received_total",
        "Total frames received from the venue"
    );
    describe_counter!(
        "ftx_stream_decode_errors_total",
        "Total inbound frames that failed to decode"
    );
    describe_counter!(
        "ftx_stream_events_published_total",
        "Total events published to consumers"
    );
    describe_counter!(
        "ftx_stream_reconnects_total",
        "Total watchdog reconnect actions"
    );
    describe_counter!(
        "ftx_stream_watchdog_failures_total",
        "Total watchdog ticks that failed"
    );
    describe_counter!(
        "ftx_stream_sends_total",
        "Total outbound writes by outcome"
    );
    describe_gauge!(
        "ftx_stream_connection_open",
        "1 while the transport is open"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Kind of watchdog reconnect.
#[derive(Debug, Clone, Copy)]
pub enum ReconnectKind {
    /// Existing transport closed and reconnected.
    Soft,
    /// Transport discarded and rebuilt.
    Hard,
}

impl ReconnectKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

/// Record an inbound frame.
pub fn record_frame_received(binary: bool) {
    counter!(
        "ftx_stream_frames_received_total",
        "encoding" => if binary { "gzip" } else { "text" }
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error() {
    counter!("ftx_stream_decode_errors_total").increment(1);
}

/// Record an event published to consumers.
pub fn record_event_published(kind: &'static str) {
    counter!("ftx_stream_events_published_total", "kind" => kind).increment(1);
}

/// Record a watchdog reconnect action.
pub fn record_reconnect(kind: ReconnectKind) {
    counter!("ftx_stream_reconnects_total", "kind" => kind.as_str()).increment(1);
}

/// Record a watchdog tick that failed.
pub fn record_watchdog_failure() {
    counter!("ftx_stream_watchdog_failures_total").increment(1);
}

/// Record an outbound write.
pub fn record_send(sent: bool) {
    counter!(
        "ftx_stream_sends_total",
        "outcome" => if sent { "sent" } else { "dropped" }
    )
    .increment(1);
}

/// Update the open-connection gauge.
pub fn set_connection_open(open: bool) {
    gauge!("ftx_stream_connection_open").set(if open { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
