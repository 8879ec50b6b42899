//! Outbound and inbound adapters that sit between the dispatcher and a
//! local [`Model`], transparently wrapping the traffic exchanged with a
//! folder shared to an encrypted-storage peer.
//!
//! Outbound is a pair of pure transforms the caller applies to its own
//! real `FileInfo`s before handing them to [`bep_core::Connection::index`]
//! or [`bep_core::Connection::index_update`]. Inbound is a [`Model`]
//! decorator: it sits on the trusted, password-holding side of the
//! connection and answers Requests that arrive carrying the encrypted
//! coordinates an untrusted peer observed in an Index.

use std::sync::Arc;

use async_trait::async_trait;
use bep_core::{ConnectionError, Environment, Model, RequestFailure, RequestResult};
use bep_model::{BlockInfo, Counter, DeviceID, FileInfo, ShortID, Vector};
use bep_proto::{ClusterConfig, FileDownloadProgressUpdate};
use tracing::{debug, warn};

use crate::aead::{open_deterministic, seal_deterministic, seal_random, RANDOM_NONCE_LEN};
use crate::error::CryptoError;
use crate::keys::{file_key, FileKey, FolderKey};
use crate::name::{decode_path, encode_path};

/// Deterministically seal a real block hash into the token an
/// encrypted-storage peer sees, binding it to the real block's offset as
/// additional data.
fn encrypt_block_hash(
    key: &FileKey,
    real_hash: &[u8],
    real_offset: i64,
) -> Result<Vec<u8>, CryptoError> {
    seal_deterministic(key.as_bytes(), real_hash, &real_offset.to_be_bytes())
}

/// Open a block-hash token, trying the current offset-bound additional
/// data first and falling back to no additional data for peers that
/// sealed it without binding an offset.
fn decrypt_block_hash(
    key: &FileKey,
    token: &[u8],
    real_offset: i64,
) -> Result<Vec<u8>, CryptoError> {
    open_deterministic(key.as_bytes(), token, &real_offset.to_be_bytes())
        .or_else(|_| open_deterministic(key.as_bytes(), token, &[]))
}

/// Extra bytes a fake block's reported size carries over its real size.
pub const BLOCK_OVERHEAD: i64 = 40;

/// Floor a decrypted response payload is padded up to with random bytes,
/// so an encrypted-storage peer can never infer that a real block was
/// smaller than this.
pub const MIN_PADDED_SIZE: usize = 1024;

/// A real [`FileInfo`] rewritten for an encrypted-storage peer.
#[derive(Debug, Clone)]
pub struct EncryptedFileInfo {
    /// What actually goes out on the wire in place of `real`.
    pub visible: FileInfo,
    /// `seal_random` of the CBOR-encoded real `FileInfo`, for the embedder
    /// to keep alongside `visible` so the true metadata can be recovered.
    pub encrypted: Vec<u8>,
}

/// Rewrite `real` into the form an encrypted-storage peer sees: name and
/// block hashes replaced by deterministic tokens, block sizes inflated by
/// [`BLOCK_OVERHEAD`] and floored at [`MIN_PADDED_SIZE`] (matching the
/// floor [`InboundAdapter`] actually seals replies up to), and `version`
/// forced to a single counter derived from `visible_version_nanos` so the
/// peer always treats this as the newest version it has seen for the
/// name.
///
/// # Errors
///
/// Propagates [`CryptoError`] from name or key derivation, or from
/// sealing the block hashes and the encrypted blob.
pub fn encrypt_file_info(
    real: &FileInfo,
    folder_key: &FolderKey,
    modified_by: ShortID,
    visible_version_nanos: u64,
    blob_nonce: [u8; RANDOM_NONCE_LEN],
) -> Result<EncryptedFileInfo, CryptoError> {
    let mut visible = real.clone();
    visible.name = encode_path(&real.name, folder_key)?;
    visible.blocks = encrypt_block_list(&real.blocks, folder_key, &real.name)?;
    visible.blocks_hash = Vec::new();
    visible.version =
        Vector::from_counters([Counter { id: modified_by, value: visible_version_nanos }]);

    let mut real_bytes = Vec::new();
    ciborium::into_writer(real, &mut real_bytes)
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;
    let encrypted = seal_random(folder_key.as_bytes(), &real_bytes, blob_nonce);

    Ok(EncryptedFileInfo { visible, encrypted })
}

fn encrypt_block_list(
    blocks: &[BlockInfo],
    folder_key: &FolderKey,
    filename: &str,
) -> Result<Vec<BlockInfo>, CryptoError> {
    let key = file_key(folder_key, filename)?;

    let mut fake_offset: i64 = 0;
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        let token = encrypt_block_hash(&key, &block.hash, block.offset)?;
        let fake_size = (i64::from(block.size) + BLOCK_OVERHEAD).max(MIN_PADDED_SIZE as i64);
        out.push(BlockInfo {
            hash: token,
            offset: fake_offset,
            size: i32::try_from(fake_size).unwrap_or(i32::MAX),
        });
        fake_offset += fake_size;
    }
    Ok(out)
}

/// Recover the real `(offset, size)` of a block given the fake coordinates
/// an encrypted-storage peer reported in a Request.
#[must_use]
pub fn real_block_window(block_no: i32, fake_offset: i64, fake_size: i32) -> (i64, i32) {
    let real_offset = fake_offset - i64::from(block_no) * BLOCK_OVERHEAD;
    let real_size = i32::try_from(i64::from(fake_size) - BLOCK_OVERHEAD).unwrap_or(0);
    (real_offset, real_size)
}

/// Pad `data` up to [`MIN_PADDED_SIZE`] with `padding`.
///
/// # Panics
///
/// Panics if `data` is shorter than [`MIN_PADDED_SIZE`] and `padding`
/// supplies fewer than the missing bytes; the caller is expected to
/// always provide at least `MIN_PADDED_SIZE` bytes of randomness.
#[must_use]
pub fn pad_response(mut data: Vec<u8>, padding: &[u8]) -> Vec<u8> {
    if data.len() < MIN_PADDED_SIZE {
        let needed = MIN_PADDED_SIZE - data.len();
        data.extend_from_slice(&padding[..needed]);
    }
    data
}

/// [`Model`] decorator for the trusted, password-holding side of a
/// connection to an encrypted-storage peer. Requests that arrive carry
/// the encrypted name, fake block coordinates, and a block-hash token
/// instead of plaintext; this wrapper recovers the real request, asks
/// `inner` to serve it, then pads and reseals the answer so the
/// untrusted peer only ever sees opaque bytes.
///
/// Every other [`Model`] callback passes through unchanged: the trusted
/// side's own Index/IndexUpdate/ClusterConfig/DownloadProgress traffic is
/// already handled in plaintext by `inner`, and outbound encryption is the
/// caller's responsibility via [`encrypt_file_info`] before it ever
/// reaches the dispatcher.
pub struct InboundAdapter<E, M> {
    inner: Arc<M>,
    folder_key: FolderKey,
    env: E,
}

impl<E: Environment, M: Model> InboundAdapter<E, M> {
    /// Wrap `inner` so Requests on `folder_key`'s folder are transparently
    /// decrypted before being served and the reply re-encrypted.
    pub fn new(inner: Arc<M>, folder_key: FolderKey, env: E) -> Self {
        Self { inner, folder_key, env }
    }
}

#[async_trait]
impl<E: Environment, M: Model> Model for InboundAdapter<E, M> {
    async fn index(
        &self,
        device: DeviceID,
        folder: &str,
        files: Vec<FileInfo>,
    ) -> Result<(), ConnectionError> {
        self.inner.index(device, folder, files).await
    }

    async fn index_update(
        &self,
        device: DeviceID,
        folder: &str,
        files: Vec<FileInfo>,
    ) -> Result<(), ConnectionError> {
        self.inner.index_update(device, folder, files).await
    }

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
    ) -> RequestResult {
        let real_name = decode_path(name, &self.folder_key).map_err(|err| {
            warn!(device = %device, folder, %err, "rejecting request for unencrypted or foreign-key name");
            RequestFailure::NoSuchFile
        })?;
        let key = file_key(&self.folder_key, &real_name).map_err(|_| RequestFailure::Generic)?;
        let (real_offset, real_size) = real_block_window(block_no, offset, size);
        let real_hash = decrypt_block_hash(&key, hash, real_offset).map_err(|err| {
            warn!(device = %device, folder, name = %real_name, %err, "block-hash token failed to authenticate");
            RequestFailure::Generic
        })?;

        debug!(device = %device, folder, name = %real_name, block_no, real_offset, real_size, "serving encrypted request");
        let real_bytes = self
            .inner
            .request(
                device,
                folder,
                &real_name,
                block_no,
                real_offset,
                real_size,
                &real_hash,
                weak_hash,
                from_temporary,
            )
            .await?;

        let mut padding = vec![0u8; MIN_PADDED_SIZE];
        self.env.random_bytes(&mut padding);
        let padded = pad_response(real_bytes, &padding);

        let mut nonce = [0u8; RANDOM_NONCE_LEN];
        self.env.random_bytes(&mut nonce);
        Ok(seal_random(key.as_bytes(), &padded, nonce))
    }

    async fn cluster_config(
        &self,
        device: DeviceID,
        cc: ClusterConfig,
    ) -> Result<(), ConnectionError> {
        self.inner.cluster_config(device, cc).await
    }

    async fn download_progress(
        &self,
        device: DeviceID,
        folder: &str,
        updates: Vec<FileDownloadProgressUpdate>,
    ) -> Result<(), ConnectionError> {
        self.inner.download_progress(device, folder, updates).await
    }

    async fn closed(&self, device: DeviceID, err: Option<ConnectionError>) {
        self.inner.closed(device, err).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::folder_key;

    fn sample_file() -> FileInfo {
        FileInfo {
            name: "docs/report.pdf".to_string(),
            size: 4096,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 0,
            version: Vector::new(),
            sequence: 0,
            blocks: vec![
                BlockInfo { hash: vec![1; 32], offset: 0, size: 2048 },
                BlockInfo { hash: vec![2; 32], offset: 2048, size: 2048 },
            ],
            symlink_target: Vec::new(),
            blocks_hash: Vec::new(),
            file_type: bep_model::FileType::File,
            permissions: 0o644,
            raw_block_size: bep_model::MIN_BLOCK_SIZE as i32,
            deleted: false,
            no_permissions: false,
            local_flags: 0,
        }
    }

    #[test]
    fn encrypted_file_info_hides_the_real_name_and_block_list() {
        let key = folder_key("hunter2", "folder-a").unwrap();
        let real = sample_file();
        let enc = encrypt_file_info(&real, &key, 7, 123, [9u8; RANDOM_NONCE_LEN]).unwrap();

        assert_ne!(enc.visible.name, real.name);
        assert_eq!(enc.visible.blocks.len(), real.blocks.len());
        for (fake, original) in enc.visible.blocks.iter().zip(&real.blocks) {
            assert_ne!(fake.hash, original.hash);
            assert_eq!(i64::from(fake.size) - BLOCK_OVERHEAD, i64::from(original.size));
        }
        assert_eq!(enc.visible.version.counter(7), 123);
    }

    #[test]
    fn fake_offsets_are_cumulative_and_invert_cleanly() {
        let key = folder_key("hunter2", "folder-a").unwrap();
        let real = sample_file();
        let enc = encrypt_file_info(&real, &key, 7, 123, [9u8; RANDOM_NONCE_LEN]).unwrap();

        for (block_no, (fake, original)) in enc.visible.blocks.iter().zip(&real.blocks).enumerate()
        {
            let (real_offset, real_size) = real_block_window(
                i32::try_from(block_no).unwrap(),
                fake.offset,
                fake.size,
            );
            assert_eq!(real_offset, original.offset);
            assert_eq!(real_size, original.size);
        }
    }

    #[test]
    fn small_blocks_get_a_fake_size_floored_at_min_padded_size() {
        let key = folder_key("hunter2", "folder-a").unwrap();
        let mut real = sample_file();
        real.blocks = vec![BlockInfo { hash: vec![1; 32], offset: 0, size: 128 }];
        let enc = encrypt_file_info(&real, &key, 7, 123, [9u8; RANDOM_NONCE_LEN]).unwrap();

        assert_eq!(enc.visible.blocks[0].size, i32::try_from(MIN_PADDED_SIZE).unwrap());
    }

    #[test]
    fn pad_response_leaves_large_payloads_untouched() {
        let data = vec![0u8; MIN_PADDED_SIZE + 10];
        let padding = vec![1u8; MIN_PADDED_SIZE];
        let padded = pad_response(data.clone(), &padding);
        assert_eq!(padded, data);
    }

    #[test]
    fn pad_response_pads_small_payloads_up_to_the_floor() {
        let data = vec![0u8; 3];
        let padding = vec![1u8; MIN_PADDED_SIZE];
        let padded = pad_response(data, &padding);
        assert_eq!(padded.len(), MIN_PADDED_SIZE);
    }
}
