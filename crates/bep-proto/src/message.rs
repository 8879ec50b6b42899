//! The eight message payload types carried inside a frame, and the sum
//! type that ties them to their [`Header`](crate::header::Header).

use bep_model::FileInfo;
use serde::{Deserialize, Serialize};

use crate::header::MessageType;

/// A device as advertised inside a folder's [`ClusterConfig`] entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfigDevice {
    /// The 32-byte device identity.
    pub id: bep_model::DeviceID,
    /// Human-readable name.
    pub name: String,
    /// Addresses the device can be dialed at, e.g. `tcp://host:port`.
    pub addresses: Vec<String>,
    /// This device's contribution to the folder's shared version vector.
    pub max_sequence: i64,
    /// Whether this device only introduces other devices, without syncing.
    pub introducer: bool,
}

/// A folder as advertised inside a [`ClusterConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfigFolder {
    /// Stable folder identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Whether this folder is read-only for the sender.
    pub read_only: bool,
    /// Devices sharing this folder.
    pub devices: Vec<ClusterConfigDevice>,
}

/// Inaugural message per direction, describing folders and their member
/// devices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// The folders the sender shares with this peer.
    pub folders: Vec<ClusterConfigFolder>,
}

/// A full snapshot of FileInfos for one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// The folder this snapshot belongs to.
    pub folder: String,
    /// Every file known in the folder, as of this snapshot.
    pub files: Vec<FileInfo>,
}

/// A delta of FileInfos for one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexUpdate {
    /// The folder this delta applies to.
    pub folder: String,
    /// The files that changed since the last Index/IndexUpdate.
    pub files: Vec<FileInfo>,
}

/// A block fetch by `(folder, name, offset, size, hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique among this connection's pending requests.
    pub id: i32,
    /// The folder the requested file belongs to.
    pub folder: String,
    /// Folder-relative name of the requested file.
    pub name: String,
    /// Index of the requested block within the file.
    pub block_no: i32,
    /// Byte offset of the requested block within the file.
    pub offset: i64,
    /// Size of the requested block in bytes.
    pub size: i32,
    /// Expected strong hash of the block.
    pub hash: Vec<u8>,
    /// Expected weak (rolling) hash of the block.
    pub weak_hash: u32,
    /// Whether to read from a temporary (partially-downloaded) file.
    pub from_temporary: bool,
}

/// Per-request error codes carried on a [`Response`]; the mapping to/from
/// wire codes is a fixed bijection, with unknown codes mapping to
/// `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The request succeeded.
    NoError,
    /// An unspecified failure occurred.
    Generic,
    /// The requested file does not exist.
    NoSuchFile,
    /// The requested file is marked invalid.
    InvalidFile,
}

/// The (possibly compressed and/or encrypted) reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id matching the originating [`Request`].
    pub id: i32,
    /// The requested block's bytes, empty on error.
    pub data: Vec<u8>,
    /// Outcome of the request.
    pub code: ErrorCode,
}

/// Keepalive with no payload content of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ping;

/// Graceful termination, carrying a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Human-readable reason the sender is closing the connection.
    pub reason: String,
}

/// A single in-flight block's download progress, within a
/// [`DownloadProgress`] update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDownloadProgressUpdate {
    /// Folder-relative name of the file being downloaded.
    pub name: String,
    /// Indices of blocks already fetched into the temporary file.
    pub blocks_pulled: Vec<i32>,
}

/// Progress updates for partially-downloaded files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// The folder the updates apply to.
    pub folder: String,
    /// Per-file progress updates.
    pub updates: Vec<FileDownloadProgressUpdate>,
}

/// Sum type over the eight message payloads a [`Header`](crate::header::Header)
/// may select. Unrecognized header types never produce a `Message` — they
/// are skipped by the caller before a payload is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// See [`ClusterConfig`].
    ClusterConfig(ClusterConfig),
    /// See [`Index`].
    Index(Index),
    /// See [`IndexUpdate`].
    IndexUpdate(IndexUpdate),
    /// See [`Request`].
    Request(Request),
    /// See [`Response`].
    Response(Response),
    /// See [`Ping`].
    Ping(Ping),
    /// See [`Close`].
    Close(Close),
    /// See [`DownloadProgress`].
    DownloadProgress(DownloadProgress),
}

impl Message {
    /// The [`MessageType`] this payload corresponds to.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ClusterConfig(_) => MessageType::ClusterConfig,
            Self::Index(_) => MessageType::Index,
            Self::IndexUpdate(_) => MessageType::IndexUpdate,
            Self::Request(_) => MessageType::Request,
            Self::Response(_) => MessageType::Response,
            Self::Ping(_) => MessageType::Ping,
            Self::Close(_) => MessageType::Close,
            Self::DownloadProgress(_) => MessageType::DownloadProgress,
        }
    }

    /// Encode just this message's payload body as CBOR (the frame codec
    /// prepends the length-prefixed [`Header`](crate::header::Header)
    /// separately).
    pub fn encode_body(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let mut buf = Vec::new();
        let result = match self {
            Self::ClusterConfig(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::Index(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::IndexUpdate(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::Request(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::Response(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::Ping(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::Close(m) => ciborium::ser::into_writer(m, &mut buf),
            Self::DownloadProgress(m) => ciborium::ser::into_writer(m, &mut buf),
        };
        result.map(|()| buf)
    }

    /// Decode a payload body given the [`MessageType`] selecting its shape.
    /// Returns `None` for an unrecognized type; callers should skip those
    /// without attempting a decode.
    pub fn decode_body(
        message_type: MessageType,
        body: &[u8],
    ) -> Option<Result<Self, ciborium::de::Error<std::io::Error>>> {
        Some(match message_type {
            MessageType::ClusterConfig => ciborium::de::from_reader(body).map(Self::ClusterConfig),
            MessageType::Index => ciborium::de::from_reader(body).map(Self::Index),
            MessageType::IndexUpdate => ciborium::de::from_reader(body).map(Self::IndexUpdate),
            MessageType::Request => ciborium::de::from_reader(body).map(Self::Request),
            MessageType::Response => ciborium::de::from_reader(body).map(Self::Response),
            MessageType::Ping => ciborium::de::from_reader(body).map(Self::Ping),
            MessageType::Close => ciborium::de::from_reader(body).map(Self::Close),
            MessageType::DownloadProgress => {
                ciborium::de::from_reader(body).map(Self::DownloadProgress)
            },
            MessageType::Unknown(_) => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use bep_model::{FileType, Vector};

    use super::*;

    fn sample_file() -> FileInfo {
        FileInfo {
            name: "a/b.txt".to_string(),
            size: 4,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 0,
            version: Vector::new(),
            sequence: 1,
            blocks: vec![bep_model::BlockInfo { hash: vec![0; 32], offset: 0, size: 4 }],
            symlink_target: Vec::new(),
            blocks_hash: Vec::new(),
            file_type: FileType::File,
            permissions: 0o644,
            raw_block_size: bep_model::MIN_BLOCK_SIZE as i32,
            deleted: false,
            no_permissions: false,
            local_flags: 0,
        }
    }

    #[test]
    fn index_round_trips_through_cbor() {
        let msg = Message::Index(Index { folder: "default".to_string(), files: vec![sample_file()] });
        let body = msg.encode_body().unwrap();
        let decoded = Message::decode_body(MessageType::Index, &body).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn request_round_trips_through_cbor() {
        let msg = Message::Request(Request {
            id: 7,
            folder: "default".to_string(),
            name: "a/b.txt".to_string(),
            block_no: 0,
            offset: 0,
            size: 131_072,
            hash: vec![1; 32],
            weak_hash: 42,
            from_temporary: false,
        });
        let body = msg.encode_body().unwrap();
        let decoded = Message::decode_body(MessageType::Request, &body).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn response_error_code_round_trips() {
        let msg = Message::Response(Response { id: 7, data: Vec::new(), code: ErrorCode::NoSuchFile });
        let body = msg.encode_body().unwrap();
        let decoded = Message::decode_body(MessageType::Response, &body).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_message_type_is_not_decoded() {
        assert!(Message::decode_body(MessageType::Unknown(99), &[]).is_none());
    }

    #[test]
    fn message_type_matches_payload_variant() {
        let msg = Message::Ping(Ping);
        assert_eq!(msg.message_type(), MessageType::Ping);
    }
}
