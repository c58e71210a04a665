//! Settings loaded from `FTX_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::liveness::LivenessPolicy;
use crate::infrastructure::broadcast::EventHubConfig;
use crate::infrastructure::ftx::{AuthError, ClientConfig, Credentials, SupervisorConfig};

/// Default Prometheus metrics port (0 = disabled).
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// A channel to subscribe to, with an optional market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel name, e.g. `orderbook`.
    pub channel: String,
    /// Market, e.g. `BTC-PERP`.
    pub market: Option<String>,
}

impl FromStr for ChannelSpec {
    type Err = ConfigError;

    /// Parse `channel` or `channel:market`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, market) = match s.trim().split_once(':') {
            Some((channel, market)) => (channel.trim(), Some(market.trim())),
            None => (s.trim(), None),
        };

        if channel.is_empty() || market.is_some_and(str::is_empty) {
            return Err(ConfigError::InvalidChannel(s.to_string()));
        }

        Ok(Self {
            channel: channel.to_string(),
            market: market.map(str::to_string),
        })
    }
}

/// Complete binary configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Client configuration.
    pub client: ClientConfig,
    /// Login credentials (`None` = public channels only).
    pub credentials: Option<Credentials>,
    /// Channels subscribed after connecting.
    pub channels: Vec<ChannelSpec>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SupervisorConfig::default();

        let endpoint = lookup("FTX_WS_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.endpoint);

        let reconnect = parse_duration_secs(
            &lookup,
            "FTX_RECONNECT_THRESHOLD_SECS",
            defaults.liveness.reconnect_threshold(),
        )?;
        let renew = parse_duration_secs(
            &lookup,
            "FTX_RENEW_THRESHOLD_SECS",
            defaults.liveness.renew_threshold(),
        )?;
        let liveness = LivenessPolicy::new(reconnect, renew)
            .ok_or(ConfigError::InvalidThresholds { reconnect, renew })?;

        let watchdog_interval = parse_duration_secs(
            &lookup,
            "FTX_WATCHDOG_INTERVAL_SECS",
            defaults.watchdog_interval,
        )?;
        if watchdog_interval.is_zero() {
            return Err(ConfigError::EmptyValue(
                "FTX_WATCHDOG_INTERVAL_SECS".to_string(),
            ));
        }

        let keepalive_interval =
            parse_duration_secs(&lookup, "FTX_KEEPALIVE_SECS", Duration::ZERO)?;

        let supervisor = SupervisorConfig {
            endpoint,
            watchdog_interval,
            liveness,
            keepalive_interval: (!keepalive_interval.is_zero()).then_some(keepalive_interval),
            ..defaults
        };

        let events = EventHubConfig {
            capacity: parse_usize(
                &lookup,
                "FTX_EVENT_CAPACITY",
                EventHubConfig::default().capacity,
            )?,
        };

        let channels = lookup("FTX_CHANNELS")
            .map(|v| {
                v.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(ChannelSpec::from_str)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            client: ClientConfig {
                supervisor,
                events,
                command_capacity: None,
            },
            credentials: credentials(&lookup)?,
            channels,
            metrics_port: parse_u16(&lookup, "FTX_STREAM_METRICS_PORT", DEFAULT_METRICS_PORT)?,
        })
    }
}

fn credentials(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Credentials>, ConfigError> {
    let Some(api_key) = lookup("FTX_API_KEY").filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let api_secret = lookup("FTX_API_SECRET")
        .ok_or_else(|| ConfigError::MissingEnvVar("FTX_API_SECRET".to_string()))?;
    if api_secret.is_empty() {
        return Err(ConfigError::EmptyValue("FTX_API_SECRET".to_string()));
    }

    let credentials = Credentials::new(api_key, api_secret)?;
    Ok(Some(
        match lookup("FTX_SUBACCOUNT").filter(|v| !v.is_empty()) {
            Some(subaccount) => credentials.with_subaccount(subaccount),
            None => credentials,
        },
    ))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Reconnect threshold is not below the renew threshold.
    #[error("reconnect threshold {reconnect:?} must be below renew threshold {renew:?}")]
    InvalidThresholds {
        /// Soft reconnect threshold.
        reconnect: Duration,
        /// Hard re-initialize threshold.
        renew: Duration,
    },
    /// Environment variable is not a valid number.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// Channel entry is not `channel` or `channel:market`.
    #[error("invalid channel entry: {0:?}")]
    InvalidChannel(String),
    /// Credentials were rejected.
    #[error(transparent)]
    Credentials(#[from] AuthError),
}

fn parse_u16(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    parse_number(lookup, key).map(|v| v.unwrap_or(default))
}

fn parse_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    parse_number(lookup, key).map(|v| v.unwrap_or(default))
}

fn parse_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_number(lookup, key).map(|v| v.map_or(default, Duration::from_secs))
}

/// Parse a numeric variable; unset or blank means "use the default".
fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })
}
