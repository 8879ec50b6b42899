//! Error types for Hello negotiation and frame codec failures.

use thiserror::Error;

/// Failure negotiating protocol identity during the Hello exchange.
#[derive(Debug, Error)]
pub enum HelloError {
    /// The peer's first four bytes matched a recognized pre-v0.14 magic.
    #[error("peer speaks a version too old to interoperate (magic {0:#010X})")]
    TooOldVersion(u32),
    /// The peer's first four bytes matched no known magic at all.
    #[error("unrecognized magic {0:#010X}")]
    UnknownMagic(u32),
    /// `msg_len` exceeded [`crate::hello::MAX_HELLO_LEN`].
    #[error("hello message length {0} exceeds the maximum")]
    TooLong(u16),
    /// CBOR decoding of the Hello payload failed.
    #[error("malformed hello payload: {0}")]
    Malformed(String),
    /// Transport I/O failed while reading or writing the Hello.
    #[error("transport error during hello: {0}")]
    Io(#[from] std::io::Error),
}

impl HelloError {
    /// Whether this is a version-mismatch error suitable for user-visible
    /// alerting, as opposed to a transport or encoding failure.
    #[must_use]
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::TooOldVersion(_) | Self::UnknownMagic(_))
    }
}

/// Failure decoding or encoding a post-Hello frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// `hdr_len` or `msg_len` was negative or exceeded its ceiling.
    #[error("frame length {length} exceeds the maximum of {max}")]
    LengthExceeded {
        /// The offending length field.
        length: u64,
        /// The ceiling it exceeded.
        max: u64,
    },
    /// The frame was truncated before a complete header or payload arrived.
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the frame declared it would carry.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },
    /// LZ4 decompression of the payload failed.
    #[error("lz4 decompression failed: {0}")]
    Decompression(String),
    /// CBOR decoding of the header or message body failed.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Transport I/O failed while reading or writing a frame.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
