//! Frame Codec
//!
//! Encodes outbound control messages and decodes inbound frames for the FTX
//! WebSocket API.
//!
//! # Outbound
//!
//! ```json
//! {"args":{"key":"<K>","sign":"<S>","time":<T>},"op":"login"}
//! {"op":"subscribe","channel":"<C>"}
//! {"op":"subscribe","channel":"<C>","market":"<M>"}
//! {"op":"unsubscribe","channel":"<C>","market":"<M>"}
//! {"op":"ping"}
//! ```
//!
//! # Inbound
//!
//! Text frames are forwarded unchanged. Binary frames carry gzip-compressed
//! UTF-8 JSON and are inflated fully into memory. The inbound JSON structure
//! is not parsed here.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;

use crate::domain::frame::Frame;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Gzip stream was corrupt or truncated.
    #[error("gzip decompression failed: {0}")]
    Decompress(std::io::Error),

    /// Gzip compression failed.
    #[error("gzip compression failed: {0}")]
    Compress(std::io::Error),

    /// Decompressed payload was not UTF-8.
    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Debug, Serialize)]
struct LoginArgs<'a> {
    key: &'a str,
    sign: &'a str,
    time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    subaccount: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    args: LoginArgs<'a>,
    op: &'static str,
}

#[derive(Debug, Serialize)]
struct ChannelRequest<'a> {
    op: &'static str,
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    market: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpRequest {
    op: &'static str,
}

/// Render a fixed wire shape.
///
/// The shapes above hold only strings and integers, which cannot fail to
/// serialize.
#[allow(clippy::expect_used)]
fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("control message shapes always serialize")
}

// =============================================================================
// Codec
// =============================================================================

/// Stateless codec for FTX control messages and inbound frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Build a login request.
    #[must_use]
    pub fn login(api_key: &str, signature: &str, timestamp_ms: i64) -> String {
        Self::login_with_subaccount(api_key, signature, timestamp_ms, None)
    }

    /// Build a login request, optionally scoped to a subaccount.
    #[must_use]
    pub fn login_with_subaccount(
        api_key: &str,
        signature: &str,
        timestamp_ms: i64,
        subaccount: Option<&str>,
    ) -> String {
        render(&LoginRequest {
            args: LoginArgs {
                key: api_key,
                sign: signature,
                time: timestamp_ms,
                subaccount,
            },
            op: "login",
        })
    }

    /// Build a subscribe request for a channel without a market.
    #[must_use]
    pub fn subscribe(channel: &str) -> String {
        Self::channel_request("subscribe", channel, None)
    }

    /// Build a subscribe request for a channel on one market.
    #[must_use]
    pub fn subscribe_market(channel: &str, market: &str) -> String {
        Self::channel_request("subscribe", channel, Some(market))
    }

    /// Build an unsubscribe request for a channel without a market.
    #[must_use]
    pub fn unsubscribe(channel: &str) -> String {
        Self::channel_request("unsubscribe", channel, None)
    }

    /// Build an unsubscribe request for a channel on one market.
    #[must_use]
    pub fn unsubscribe_market(channel: &str, market: &str) -> String {
        Self::channel_request("unsubscribe", channel, Some(market))
    }

    /// Build a keepalive ping.
    #[must_use]
    pub fn ping() -> String {
        render(&OpRequest { op: "ping" })
    }

    fn channel_request(op: &'static str, channel: &str, market: Option<&str>) -> String {
        render(&ChannelRequest {
            op,
            channel,
            market,
        })
    }

    /// Serialize an arbitrary outbound object.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode an inbound frame to text.
    ///
    /// # Errors
    ///
    /// Returns an error if a binary frame is not valid gzip or does not
    /// inflate to UTF-8.
    pub fn decode(&self, frame: Frame) -> Result<String, CodecError> {
        match frame {
            Frame::Text(text) => Ok(text),
            Frame::Binary(bytes) => decompress(&bytes),
        }
    }
}

/// Inflate a gzip payload into a UTF-8 string.
///
/// # Errors
///
/// Returns an error if the stream is corrupt or the result is not UTF-8.
pub fn decompress(input: &[u8]) -> Result<String, CodecError> {
    let mut decoder = GzDecoder::new(input);
    let mut buffer = Vec::with_capacity(input.len().saturating_mul(4));
    decoder
        .read_to_end(&mut buffer)
        .map_err(CodecError::Decompress)?;
    Ok(String::from_utf8(buffer)?)
}

/// Gzip a UTF-8 string, as the venue does for binary frames.
///
/// # Errors
///
/// Returns an error if the encoder fails to write.
pub fn compress(input: &str) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(input.as_bytes())
        .map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}
