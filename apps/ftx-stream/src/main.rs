//! FTX Stream Binary
//!
//! Connects to the FTX push API, optionally logs in, subscribes to the
//! configured channels and logs every stream event until shut down.
//!
//! # Usage
//!
//! ```bash
//! FTX_CHANNELS=markets,orderbook:BTC-PERP cargo run --bin ftx-stream
//! ```
//!
//! # Environment Variables
//!
//! - `FTX_WS_URL`: WebSocket endpoint (default: wss://ftx.com/ws/)
//! - `FTX_API_KEY` / `FTX_API_SECRET`: Log in after connecting (optional)
//! - `FTX_SUBACCOUNT`: Subaccount to log in to (optional)
//! - `FTX_CHANNELS`: Comma separated `channel` or `channel:market` entries
//! - `FTX_WATCHDOG_INTERVAL_SECS`: Watchdog interval (default: 5)
//! - `FTX_RECONNECT_THRESHOLD_SECS`: Silence before a reconnect (default: 60)
//! - `FTX_RENEW_THRESHOLD_SECS`: Silence before a rebuild (default: 120)
//! - `FTX_KEEPALIVE_SECS`: Ping interval, 0 = never (default: 0)
//! - `FTX_EVENT_CAPACITY`: Event backlog per consumer (default: 10000)
//! - `FTX_STREAM_METRICS_PORT`: Prometheus metrics port, 0 = disabled (default: 9090)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ftx_stream::infrastructure::telemetry;
use ftx_stream::{
    AppConfig, ChannelSpec, FtxStreamClient, StreamEvent, WsTransportFactory, init_metrics,
};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting FTX stream");

    let config = AppConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        init_metrics(addr).context("failed to start metrics exporter")?;
        tracing::info!(%addr, "Metrics exporter listening");
    }

    let shutdown_token = CancellationToken::new();
    let client = FtxStreamClient::new(config.client.clone(), Arc::new(WsTransportFactory::new()));

    let events = client.events();
    let log_shutdown = shutdown_token.clone();
    let logger = tokio::spawn(async move { log_events(events, log_shutdown).await });

    if let Err(e) = client.connect(true).await {
        tracing::warn!(error = %e, "Initial connect failed, watchdog will retry");
    }

    if let Some(credentials) = &config.credentials {
        let outcome = client.authenticate(credentials).await?;
        tracing::info!(sent = outcome.is_sent(), "Login request");
    }

    for ChannelSpec { channel, market } in &config.channels {
        let outcome = match market {
            Some(market) => client.subscribe_market(channel, market).await?,
            None => client.subscribe(channel).await?,
        };
        tracing::info!(
            %channel,
            market = market.as_deref().unwrap_or(""),
            sent = outcome.is_sent(),
            "Subscribe request"
        );
    }

    tracing::info!("FTX stream ready");

    await_shutdown(&shutdown_token).await;

    let status = Arc::clone(client.status());
    client.shutdown().await;
    let _ = logger.await;

    let snapshot = status.snapshot();

    tracing::info!(
        messages = snapshot.messages_received,
        decode_errors = snapshot.decode_errors,
        soft_reconnects = snapshot.soft_reconnects,
        reinitializations = snapshot.reinitializations,
        "FTX stream stopped"
    );
    Ok(())
}

/// Log every stream event until shutdown.
async fn log_events(
    mut events: tokio::sync::broadcast::Receiver<StreamEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => return,
            event = events.recv() => event,
        };

        match event {
            Ok(StreamEvent::Message(text)) => tracing::info!(message = %text, "Stream message"),
            Ok(StreamEvent::Opened { generation }) => {
                tracing::info!(generation, "Stream opened");
            }
            Ok(StreamEvent::DecodeError { generation, reason }) => {
                tracing::warn!(generation, %reason, "Stream frame dropped");
            }
            Ok(StreamEvent::Reconnecting { generation }) => {
                tracing::warn!(generation, "Stream reconnecting");
            }
            Ok(StreamEvent::Reinitialized { generation }) => {
                tracing::warn!(generation, "Stream re-initialized");
            }
            Ok(StreamEvent::TransportError(message)) => {
                tracing::error!(error = %message, "Stream transport error");
            }
            Ok(StreamEvent::Closed { generation }) => {
                tracing::info!(generation, "Stream closed");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagging");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    let supervisor = &config.client.supervisor;
    tracing::info!(
        endpoint = %supervisor.endpoint,
        watchdog_secs = supervisor.watchdog_interval.as_secs(),
        reconnect_secs = supervisor.liveness.reconnect_threshold().as_secs(),
        renew_secs = supervisor.liveness.renew_threshold().as_secs(),
        channels = config.channels.len(),
        authenticated = config.credentials.is_some(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
