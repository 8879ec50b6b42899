//! An in-memory [`Model`] backed by a `HashMap`, standing in for a real
//! folder scanner and on-disk database so scenario tests can run without
//! a filesystem.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bep_core::{ConnectionError, Model, RequestFailure, RequestResult};
use bep_model::{DeviceID, FileInfo};
use bep_proto::{ClusterConfig, FileDownloadProgressUpdate};
use tracing::debug;

type BlockKey = (String, String, i32);

/// Records every inbound call it receives and answers Requests from a
/// pre-seeded block store.
#[derive(Default)]
pub struct RecordingModel {
    blocks: Mutex<HashMap<BlockKey, Vec<u8>>>,
    indexes: Mutex<Vec<(DeviceID, String, Vec<FileInfo>)>>,
    cluster_configs: Mutex<Vec<(DeviceID, ClusterConfig)>>,
}

impl RecordingModel {
    /// An empty model with no seeded blocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a block's bytes so a future matching Request succeeds.
    pub fn seed_block(&self, folder: &str, name: &str, block_no: i32, data: Vec<u8>) {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((folder.to_string(), name.to_string(), block_no), data);
    }

    /// Every Index/IndexUpdate call recorded so far, in arrival order.
    #[must_use]
    pub fn indexes(&self) -> Vec<(DeviceID, String, Vec<FileInfo>)> {
        self.indexes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Every ClusterConfig recorded so far, in arrival order.
    #[must_use]
    pub fn cluster_configs(&self) -> Vec<(DeviceID, ClusterConfig)> {
        self.cluster_configs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Model for RecordingModel {
    async fn index(
        &self,
        device: DeviceID,
        folder: &str,
        files: Vec<FileInfo>,
    ) -> Result<(), ConnectionError> {
        debug!(device = %device, folder, count = files.len(), "recording index");
        self.indexes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((device, folder.to_string(), files));
        Ok(())
    }

    async fn index_update(
        &self,
        device: DeviceID,
        folder: &str,
        files: Vec<FileInfo>,
    ) -> Result<(), ConnectionError> {
        self.index(device, folder, files).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn request(
        &self,
        _device: DeviceID,
        folder: &str,
        name: &str,
        block_no: i32,
        _offset: i64,
        _size: i32,
        _hash: &[u8],
        _weak_hash: u32,
        _from_temporary: bool,
    ) -> RequestResult {
        let found = self
            .blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(folder.to_string(), name.to_string(), block_no))
            .cloned();
        debug!(folder, name, block_no, found = found.is_some(), "serving recorded request");
        found.ok_or(RequestFailure::NoSuchFile)
    }

    async fn cluster_config(
        &self,
        device: DeviceID,
        cc: ClusterConfig,
    ) -> Result<(), ConnectionError> {
        self.cluster_configs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((device, cc));
        Ok(())
    }

    async fn download_progress(
        &self,
        _device: DeviceID,
        _folder: &str,
        _updates: Vec<FileDownloadProgressUpdate>,
    ) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn closed(&self, _device: DeviceID, _err: Option<ConnectionError>) {}
}
