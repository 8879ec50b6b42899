//! The post-Hello frame codec: `[hdr_len][Header][msg_len][payload]`, with
//! optional LZ4 compression of the payload.

use crate::compression::{compress, decompress, CompressionPolicy};
use crate::error::ProtocolError;
use crate::header::{Compression, Header, MessageType, MAX_HEADER_LEN};
use crate::message::Message;

/// Ceiling on the (possibly compressed) payload length.
pub const MAX_MESSAGE_LEN: u32 = 500_000_000;

/// Encode `message` into a complete on-wire frame: header and payload,
/// applying `policy` to decide whether to compress.
///
/// # Errors
///
/// Returns an error if CBOR encoding fails or the encoded header/payload
/// exceeds its length ceiling.
pub fn encode(message: &Message, policy: CompressionPolicy) -> Result<Vec<u8>, ProtocolError> {
    let body = message.encode_body().map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let should_compress = policy.should_compress(message.message_type(), body.len());
    let (header, payload) = if should_compress {
        let compressed = compress(&body);
        if compressed.len() < body.len() {
            (Header::new(message.message_type()).compressed(), compressed)
        } else {
            (Header::new(message.message_type()), body)
        }
    } else {
        (Header::new(message.message_type()), body)
    };

    if payload.len() as u64 > u64::from(MAX_MESSAGE_LEN) {
        return Err(ProtocolError::LengthExceeded {
            length: payload.len() as u64,
            max: u64::from(MAX_MESSAGE_LEN),
        });
    }

    let mut header_bytes = Vec::new();
    ciborium::ser::into_writer(&header, &mut header_bytes)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if header_bytes.len() as u64 > u64::from(MAX_HEADER_LEN) {
        return Err(ProtocolError::LengthExceeded {
            length: header_bytes.len() as u64,
            max: u64::from(MAX_HEADER_LEN),
        });
    }

    let mut out = Vec::with_capacity(2 + header_bytes.len() + 4 + payload.len());
    out.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Outcome of decoding a single frame from a byte buffer.
#[derive(Debug)]
pub enum Decoded {
    /// The header named a recognized message type and the payload decoded
    /// successfully.
    Message {
        /// The decoded message.
        message: Message,
        /// Total bytes the frame occupied in `input`.
        consumed: usize,
    },
    /// The header named an unrecognized message type; forward-compatible
    /// callers skip it without decoding a payload.
    Skipped {
        /// Total bytes the frame occupied in `input`.
        consumed: usize,
    },
}

/// Decode one frame from the front of `input`.
///
/// # Errors
///
/// Returns [`ProtocolError::Truncated`] if `input` doesn't yet contain a
/// complete frame (the caller should read more and retry), or a framing/
/// decode error for malformed input.
pub fn decode(input: &[u8]) -> Result<Decoded, ProtocolError> {
    if input.len() < 2 {
        return Err(ProtocolError::Truncated { expected: 2, actual: input.len() });
    }
    let hdr_len = u16::from_be_bytes([input[0], input[1]]) as usize;
    if hdr_len > MAX_HEADER_LEN as usize {
        return Err(ProtocolError::LengthExceeded {
            length: hdr_len as u64,
            max: u64::from(MAX_HEADER_LEN),
        });
    }

    let after_hdr_len = 2 + hdr_len;
    if input.len() < after_hdr_len + 4 {
        return Err(ProtocolError::Truncated { expected: after_hdr_len + 4, actual: input.len() });
    }

    let header: Header = ciborium::de::from_reader(&input[2..after_hdr_len])
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let msg_len = u32::from_be_bytes([
        input[after_hdr_len],
        input[after_hdr_len + 1],
        input[after_hdr_len + 2],
        input[after_hdr_len + 3],
    ]);
    if msg_len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::LengthExceeded { length: u64::from(msg_len), max: u64::from(MAX_MESSAGE_LEN) });
    }

    let payload_start = after_hdr_len + 4;
    let payload_end = payload_start + msg_len as usize;
    if input.len() < payload_end {
        return Err(ProtocolError::Truncated { expected: payload_end, actual: input.len() });
    }
    let raw_payload = &input[payload_start..payload_end];

    let MessageType::Unknown(_) = header.message_type else {
        let body = match header.compression {
            Compression::None => raw_payload.to_vec(),
            Compression::Lz4 => decompress(raw_payload)?,
        };
        let Some(decoded) = Message::decode_body(header.message_type, &body) else {
            unreachable!("header.message_type was just matched as not Unknown")
        };
        let message = decoded.map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        return Ok(Decoded::Message { message, consumed: payload_end });
    };

    Ok(Decoded::Skipped { consumed: payload_end })
}

#[cfg(test)]
mod tests {
    use bep_model::{DeviceID, FileType, Vector};

    use super::*;
    use crate::message::{ClusterConfig, Index, Ping, Request};

    fn sample_file() -> bep_model::FileInfo {
        bep_model::FileInfo {
            name: "a.txt".to_string(),
            size: 0,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 0,
            version: Vector::new(),
            sequence: 1,
            blocks: Vec::new(),
            symlink_target: Vec::new(),
            blocks_hash: Vec::new(),
            file_type: FileType::Directory,
            permissions: 0o755,
            raw_block_size: bep_model::MIN_BLOCK_SIZE as i32,
            deleted: false,
            no_permissions: false,
            local_flags: 0,
        }
    }

    #[test]
    fn round_trips_uncompressed_ping() {
        let msg = Message::ClusterConfig(ClusterConfig::default());
        let wire = encode(&msg, CompressionPolicy::Never).unwrap();
        match decode(&wire).unwrap() {
            Decoded::Message { message, consumed } => {
                assert_eq!(message, msg);
                assert_eq!(consumed, wire.len());
            },
            Decoded::Skipped { .. } => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn round_trips_compressed_index() {
        let msg = Message::Index(Index {
            folder: "default".to_string(),
            files: vec![sample_file(); 50],
        });
        let wire = encode(&msg, CompressionPolicy::Always).unwrap();
        let uncompressed_wire = encode(&msg, CompressionPolicy::Never).unwrap();
        assert!(wire.len() < uncompressed_wire.len());

        match decode(&wire).unwrap() {
            Decoded::Message { message, .. } => assert_eq!(message, msg),
            Decoded::Skipped { .. } => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn metadata_only_never_compresses_response() {
        let msg = Message::Response(crate::message::Response {
            id: 1,
            data: vec![0u8; 10_000],
            code: crate::message::ErrorCode::NoError,
        });
        let wire = encode(&msg, CompressionPolicy::MetadataOnly).unwrap();
        match decode(&wire).unwrap() {
            Decoded::Message { message, .. } => assert_eq!(message, msg),
            Decoded::Skipped { .. } => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn request_round_trips() {
        let msg = Message::Request(Request {
            id: 42,
            folder: "default".to_string(),
            name: "file".to_string(),
            block_no: 3,
            offset: 384,
            size: 128,
            hash: vec![7; 32],
            weak_hash: 0,
            from_temporary: true,
        });
        let wire = encode(&msg, CompressionPolicy::Never).unwrap();
        match decode(&wire).unwrap() {
            Decoded::Message { message, .. } => assert_eq!(message, msg),
            Decoded::Skipped { .. } => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn truncated_input_is_reported() {
        let msg = Message::Ping(Ping);
        let wire = encode(&msg, CompressionPolicy::Never).unwrap();
        let result = decode(&wire[..wire.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn unknown_header_type_is_skipped_not_fatal() {
        let header = Header::new(MessageType::Unknown(250));
        let mut header_bytes = Vec::new();
        ciborium::ser::into_writer(&header, &mut header_bytes).unwrap();

        let mut wire = Vec::new();
        wire.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
        wire.extend_from_slice(&header_bytes);
        wire.extend_from_slice(&0u32.to_be_bytes());

        match decode(&wire).unwrap() {
            Decoded::Skipped { consumed } => assert_eq!(consumed, wire.len()),
            Decoded::Message { .. } => panic!("expected the frame to be skipped"),
        }
    }

    #[test]
    fn device_id_travels_inside_cluster_config() {
        let device = crate::message::ClusterConfigDevice {
            id: DeviceID::new([3; 32]),
            name: "peer".to_string(),
            addresses: vec!["tcp://10.0.0.1:22000".to_string()],
            max_sequence: 12,
            introducer: false,
        };
        let folder = crate::message::ClusterConfigFolder {
            id: "default".to_string(),
            label: "Default Folder".to_string(),
            read_only: false,
            devices: vec![device],
        };
        let msg = Message::ClusterConfig(ClusterConfig { folders: vec![folder] });

        let wire = encode(&msg, CompressionPolicy::Never).unwrap();
        match decode(&wire).unwrap() {
            Decoded::Message { message, .. } => assert_eq!(message, msg),
            Decoded::Skipped { .. } => panic!("expected a decoded message"),
        }
    }
}
