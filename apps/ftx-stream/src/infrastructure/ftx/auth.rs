//! FTX WebSocket Authentication
//!
//! Private channels (`fills`, `orders`) require a `login` op sent after the
//! socket opens.
//!
//! # Login Flow
//!
//! 1. Take the current time in milliseconds since the epoch.
//! 2. Sign `"{time}websocket_login"` with HMAC-SHA256 keyed by the API secret.
//! 3. Send `{"args":{"key":"...","sign":"<hex>","time":<time>},"op":"login"}`.
//!
//! The server does not acknowledge a successful login; failures arrive as
//! `{"type":"error",...}` frames on the message stream.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::codec::FrameCodec;
use crate::domain::clock;

type HmacSha256 = Hmac<Sha256>;

/// Suffix appended to the timestamp before signing.
const LOGIN_SUFFIX: &str = "websocket_login";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while preparing authentication.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// API key was empty.
    #[error("API key cannot be empty")]
    EmptyKey,

    /// API secret was empty.
    #[error("API secret cannot be empty")]
    EmptySecret,
}

// =============================================================================
// Signature
// =============================================================================

/// Compute the login signature for `timestamp_ms`.
///
/// Returns the lower-case hex HMAC-SHA256 of `"{timestamp_ms}websocket_login"`
/// keyed by `secret`. Always 64 characters.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sign(secret: &[u8], timestamp_ms: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(LOGIN_SUFFIX.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// =============================================================================
// Credentials
// =============================================================================

/// FTX API credentials.
///
/// The `Debug` implementation redacts the key and secret for safe logging.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
    subaccount: Option<String>,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if either key or secret is empty.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, AuthError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.is_empty() {
            return Err(AuthError::EmptyKey);
        }
        if api_secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }

        Ok(Self {
            api_key,
            api_secret,
            subaccount: None,
        })
    }

    /// Log in to a subaccount instead of the main account.
    #[must_use]
    pub fn with_subaccount(mut self, subaccount: impl Into<String>) -> Self {
        self.subaccount = Some(subaccount.into());
        self
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the subaccount, if any.
    #[must_use]
    pub fn subaccount(&self) -> Option<&str> {
        self.subaccount.as_deref()
    }

    /// Sign a login at `timestamp_ms`.
    #[must_use]
    pub fn sign(&self, timestamp_ms: i64) -> String {
        sign(self.api_secret.as_bytes(), timestamp_ms)
    }

    /// Build a login request stamped with the current time.
    #[must_use]
    pub fn login_request(&self) -> String {
        self.login_request_at(clock::now_millis())
    }

    /// Build a login request stamped with `timestamp_ms`.
    #[must_use]
    pub fn login_request_at(&self, timestamp_ms: i64) -> String {
        let signature = self.sign(timestamp_ms);
        FrameCodec::login_with_subaccount(
            &self.api_key,
            &signature,
            timestamp_ms,
            self.subaccount.as_deref(),
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("subaccount", &self.subaccount)
            .finish()
    }
}
