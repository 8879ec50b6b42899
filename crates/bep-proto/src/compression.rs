//! LZ4 block compression for frame payloads, and the per-connection policy
//! deciding when to apply it.

use crate::error::ProtocolError;
use crate::header::MessageType;

/// Per-connection compression setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPolicy {
    /// Never compress outbound payloads.
    Never,
    /// Compress everything except `Response` payloads, which may already be
    /// bulk block data.
    MetadataOnly,
    /// Compress every payload above the size threshold.
    Always,
}

/// Payloads smaller than this are sent uncompressed even under `Always`,
/// matching the reference implementation's skip-small-messages behavior.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 128;

impl CompressionPolicy {
    /// Whether a payload of `encoded_len` bytes for `message_type` should be
    /// LZ4-compressed under this policy.
    #[must_use]
    pub fn should_compress(self, message_type: MessageType, encoded_len: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Always => encoded_len >= COMPRESSION_THRESHOLD_BYTES,
            Self::MetadataOnly => {
                !matches!(message_type, MessageType::Response)
                    && encoded_len >= COMPRESSION_THRESHOLD_BYTES
            },
        }
    }
}

/// Compress `data` into the wire LZ4 form: a big-endian 4-byte
/// uncompressed-size prefix followed by the LZ4 block.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let compressed = lz4_flex::block::compress(data);
    let mut out = Vec::with_capacity(4 + compressed.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&compressed);
    out
}

/// Decompress the wire LZ4 form produced by [`compress`].
pub fn decompress(wire: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if wire.len() < 4 {
        return Err(ProtocolError::Truncated { expected: 4, actual: wire.len() });
    }
    let mut size_buf = [0u8; 4];
    size_buf.copy_from_slice(&wire[..4]);
    let uncompressed_size = u32::from_be_bytes(size_buf) as usize;

    lz4_flex::block::decompress(&wire[4..], uncompressed_size)
        .map_err(|e| ProtocolError::Decompression(e.to_string()))
}
