//! The per-frame `Header`: which message type follows, and whether the
//! payload is LZ4-compressed.
//!
//! `MessageType` carries an explicit [`MessageType::Unknown`] variant so
//! that a header naming a type this implementation doesn't recognize still
//! decodes successfully — the dispatcher skips it instead of treating it as
//! a framing error, per the forward-compatibility rule.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ceiling on the CBOR-encoded header length.
pub const MAX_HEADER_LEN: u16 = 32767;

/// Which of the eight message types a frame's payload decodes as, or an
/// unrecognized numeric tag to be skipped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Inaugural message per direction, describing folders and devices.
    ClusterConfig,
    /// A full snapshot of FileInfos for one folder.
    Index,
    /// A delta of FileInfos for one folder.
    IndexUpdate,
    /// A block fetch by `(folder, name, offset, size, hash)`.
    Request,
    /// The (possibly compressed/encrypted) reply to a Request.
    Response,
    /// Keepalive with no payload content of interest.
    Ping,
    /// Graceful termination, carrying a human-readable reason.
    Close,
    /// Progress updates for partially-downloaded files.
    DownloadProgress,
    /// A numeric tag not recognized by this implementation.
    Unknown(u8),
}

impl MessageType {
    fn code(self) -> u8 {
        match self {
            Self::ClusterConfig => 0,
            Self::Index => 1,
            Self::IndexUpdate => 2,
            Self::Request => 3,
            Self::Response => 4,
            Self::Ping => 5,
            Self::Close => 6,
            Self::DownloadProgress => 7,
            Self::Unknown(code) => code,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::ClusterConfig,
            1 => Self::Index,
            2 => Self::IndexUpdate,
            3 => Self::Request,
            4 => Self::Response,
            5 => Self::Ping,
            6 => Self::Close,
            7 => Self::DownloadProgress,
            other => Self::Unknown(other),
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// Whether and how the frame payload is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Payload is carried as-is.
    None,
    /// Payload is LZ4 block-compressed with a big-endian size prefix.
    Lz4,
}

impl Serialize for Compression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::None => 0,
            Self::Lz4 => 1,
        })
    }
}

impl<'de> Deserialize<'de> for Compression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            other => Err(D::Error::custom(format!("invalid compression tag {other}"))),
        }
    }
}

/// Precedes every frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The message type the payload decodes as.
    pub message_type: MessageType,
    /// Whether the payload is LZ4-compressed.
    pub compression: Compression,
}

impl Header {
    /// Build a header for an uncompressed message of `message_type`.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self { message_type, compression: Compression::None }
    }

    /// Return a copy of this header with compression enabled.
    #[must_use]
    pub fn compressed(self) -> Self {
        Self { compression: Compression::Lz4, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_message_type_round_trips_through_cbor() {
        let header = Header::new(MessageType::Unknown(200));
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&header, &mut buf).unwrap();
        let decoded: Header = ciborium::de::from_reader(&buf[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn known_message_types_round_trip() {
        for mt in [
            MessageType::ClusterConfig,
            MessageType::Index,
            MessageType::IndexUpdate,
            MessageType::Request,
            MessageType::Response,
            MessageType::Ping,
            MessageType::Close,
            MessageType::DownloadProgress,
        ] {
            let header = Header::new(mt);
            let mut buf = Vec::new();
            ciborium::ser::into_writer(&header, &mut buf).unwrap();
            let decoded: Header = ciborium::de::from_reader(&buf[..]).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn invalid_compression_tag_is_rejected() {
        // Hand-craft a CBOR array [message_type, compression] with an
        // out-of-range compression tag.
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&(0u8, 9u8), &mut buf).unwrap();
        let result: Result<Header, _> = ciborium::de::from_reader(&buf[..]);
        assert!(result.is_err());
    }
}
