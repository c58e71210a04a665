//! Inbound frames as delivered by the transport.

/// One unit of transport-level delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame; on this venue always gzip-compressed UTF-8 text.
    Binary(Vec<u8>),
}

impl Frame {
    /// Whether the frame arrived as binary.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}
