//! The `Model` trait: the embedder-supplied callbacks the core dispatches
//! inbound traffic to.

use async_trait::async_trait;
use bep_model::{DeviceID, FileInfo};
use bep_proto::{ClusterConfig, FileDownloadProgressUpdate};

use crate::error::ConnectionError;

/// Outcome of a Request dispatched to the Model: the block's bytes, or an
/// error that gets coded into the wire `ErrorCode`.
pub type RequestResult = Result<Vec<u8>, RequestFailure>;

/// Why a Request could not be satisfied, mapped to the wire `ErrorCode`
/// bijection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestFailure {
    /// The requested file does not exist.
    #[error("no such file")]
    NoSuchFile,
    /// The requested file is marked invalid.
    #[error("invalid file")]
    InvalidFile,
    /// An unspecified failure occurred fetching the block.
    #[error("generic request failure")]
    Generic,
}

impl From<RequestFailure> for bep_proto::ErrorCode {
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::NoSuchFile => Self::NoSuchFile,
            RequestFailure::InvalidFile => Self::InvalidFile,
            RequestFailure::Generic => Self::Generic,
        }
    }
}

/// Callbacks the core invokes as messages arrive. Implemented by the
/// embedder (folder scanner, on-disk database, UI) — the core itself has
/// no notion of a filesystem.
#[async_trait]
pub trait Model: Send + Sync + 'static {
    /// A full Index snapshot arrived for `folder` from `device`.
    async fn index(&self, device: DeviceID, folder: &str, files: Vec<FileInfo>) -> Result<(), ConnectionError>;

    /// An IndexUpdate delta arrived for `folder` from `device`.
    async fn index_update(
        &self,
        device: DeviceID,
        folder: &str,
        files: Vec<FileInfo>,
    ) -> Result<(), ConnectionError>;

    /// `device` requested a block: `folder`/`name` at `offset..offset+size`,
    /// expected to hash to `hash` (and, for legacy peers, `weak_hash`).
    #[allow(clippy::too_many_arguments)]
    async fn request(
        &self,
        device: DeviceID,
        folder: &str,
        name: &str,
        block_no: i32,
        offset: i64,
        size: i32,
        hash: &[u8],
        weak_hash: u32,
        from_temporary: bool,
    ) -> RequestResult;

    /// `device`'s inaugural ClusterConfig arrived.
    async fn cluster_config(&self, device: DeviceID, cc: ClusterConfig) -> Result<(), ConnectionError>;

    /// `device` reported download progress for `folder`.
    async fn download_progress(
        &self,
        device: DeviceID,
        folder: &str,
        updates: Vec<FileDownloadProgressUpdate>,
    ) -> Result<(), ConnectionError>;

    /// The connection to `device` closed, successfully or with `err`.
    async fn closed(&self, device: DeviceID, err: Option<ConnectionError>);
}
