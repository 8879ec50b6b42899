//! The Hello exchange: a tiny separate codec used once, before any stateful
//! dispatch, to agree on protocol identity.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::HelloError;

/// Magic value identifying the current wire protocol.
pub const HELLO_MAGIC: u32 = 0x2EA7_D90B;

/// Magic values used by pre-v0.14 peers; recognized only to produce a clean
/// version-mismatch error rather than a generic decode failure.
pub const OLD_HELLO_MAGICS: [u32; 3] = [0x0001_0001, 0x0001_0000, 0x9F79_BC40];

/// Ceiling on the Hello payload length, matching [`crate::frame`]'s header
/// length ceiling.
pub const MAX_HELLO_LEN: u16 = 32767;

/// Payload carried by the Hello message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Human-readable name of the sending device.
    pub device_name: String,
    /// Name of the client implementation.
    pub client_name: String,
    /// Version string of the client implementation.
    pub client_version: String,
    /// Number of connections the sender currently has open to other peers.
    pub num_connections: i32,
    /// Unix timestamp in seconds; must be non-zero on sent Hellos.
    pub timestamp: i64,
}

impl Hello {
    /// Encode this Hello as `[magic][msg_len][cbor payload]`.
    pub fn encode(&self) -> Result<Vec<u8>, HelloError> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)
            .map_err(|e| HelloError::Malformed(e.to_string()))?;

        if payload.len() > MAX_HELLO_LEN as usize {
            return Err(HelloError::TooLong(payload.len() as u16));
        }

        let mut out = Vec::with_capacity(4 + 2 + payload.len());
        out.extend_from_slice(&HELLO_MAGIC.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Write this Hello to an async writer.
    pub async fn write_to<W: AsyncWriteExt + Unpin>(&self, writer: &mut W) -> Result<(), HelloError> {
        let bytes = self.encode()?;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Read a peer's Hello from an async reader, classifying magic
    /// mismatches into [`HelloError::TooOldVersion`] or
    /// [`HelloError::UnknownMagic`] before attempting to decode a payload.
    pub async fn read_from<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Self, HelloError> {
        let mut magic_buf = [0u8; 4];
        reader.read_exact(&mut magic_buf).await?;
        let magic = u32::from_be_bytes(magic_buf);

        if OLD_HELLO_MAGICS.contains(&magic) {
            return Err(HelloError::TooOldVersion(magic));
        }
        if magic != HELLO_MAGIC {
            return Err(HelloError::UnknownMagic(magic));
        }

        let mut len_buf = [0u8; 2];
        reader.read_exact(&mut len_buf).await?;
        let msg_len = u16::from_be_bytes(len_buf);
        if msg_len > MAX_HELLO_LEN {
            return Err(HelloError::TooLong(msg_len));
        }

        let mut payload = vec![0u8; msg_len as usize];
        reader.read_exact(&mut payload).await?;

        ciborium::de::from_reader(&payload[..]).map_err(|e| HelloError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Hello {
        Hello {
            device_name: "laptop".to_string(),
            client_name: "bep-core".to_string(),
            client_version: "0.1.0".to_string(),
            num_connections: 2,
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn round_trips_through_async_io() {
        let hello = sample();
        let mut buf = Vec::new();
        hello.write_to(&mut buf).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = Hello::read_from(&mut cursor).await.unwrap();
        assert_eq!(decoded, hello);
    }

    #[tokio::test]
    async fn rejects_pre_v014_magic() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x9F79_BC40u32.to_be_bytes());
        buf.extend_from_slice(&[0u8, 0u8]);

        let mut cursor = std::io::Cursor::new(buf);
        let err = Hello::read_from(&mut cursor).await.unwrap_err();
        assert!(err.is_version_mismatch());
        assert!(matches!(err, HelloError::TooOldVersion(0x9F79_BC40)));
    }

    #[tokio::test]
    async fn rejects_unknown_magic() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        buf.extend_from_slice(&[0u8, 0u8]);

        let mut cursor = std::io::Cursor::new(buf);
        let err = Hello::read_from(&mut cursor).await.unwrap_err();
        assert!(err.is_version_mismatch());
        assert!(matches!(err, HelloError::UnknownMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let hello = Hello {
            device_name: "x".repeat(70_000),
            ..sample()
        };
        assert!(matches!(hello.encode(), Err(HelloError::TooLong(_))));
    }
}
