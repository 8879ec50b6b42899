//! Wire framing for the Block Exchange Protocol.
//!
//! Covers the Hello exchange, the per-frame `Header`/message codec, LZ4
//! compression policy, and the reusable buffer pool for the block-size
//! hot path. Depends on `bep-model` for the `FileInfo`/`Vector`/`DeviceID`
//! types carried inside several message payloads.

pub mod buffer_pool;
pub mod compression;
pub mod error;
pub mod frame;
pub mod header;
pub mod hello;
pub mod message;

pub use buffer_pool::BufferPool;
pub use compression::{CompressionPolicy, COMPRESSION_THRESHOLD_BYTES};
pub use error::{HelloError, ProtocolError};
pub use frame::{decode, encode, Decoded, MAX_MESSAGE_LEN};
pub use header::{Compression, Header, MessageType, MAX_HEADER_LEN};
pub use hello::{Hello, HELLO_MAGIC, MAX_HELLO_LEN, OLD_HELLO_MAGICS};
pub use message::{
    ClusterConfig, ClusterConfigDevice, ClusterConfigFolder, Close, DownloadProgress, ErrorCode,
    FileDownloadProgressUpdate, Index, IndexUpdate, Message, Ping, Request, Response,
};
