//! Network-layer error types.

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A packet's payload did not have the shape its tag implies.
    #[error("malformed '{tag}' payload: {source}")]
    Payload {
        /// The tag the payload arrived under.
        tag: String,
        /// Why decoding failed.
        source: rmp_serde::decode::Error,
    },

    /// A packet arrived with a tag this side does not understand.
    #[error("unknown packet tag '{0}'")]
    UnknownTag(String),

    /// A frame header announced more bytes than allowed.
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is gone; nothing can be sent any more.
    #[error("connection closed")]
    Closed,
}

impl NetError {
    /// Returns `true` if the error concerns a single packet and the stream it
    /// arrived on is still usable.
    #[must_use]
    pub fn is_packet_error(&self) -> bool {
        matches!(
            self,
            NetError::Decode(_) | NetError::Payload { .. } | NetError::UnknownTag(_)
        )
    }
}
