//! Transparent encryption wrapper for Block Exchange Protocol folders
//! shared with an untrusted, password-less encrypted-storage peer.
//!
//! Key derivation (`keys`), the two AEAD primitives the rest of the crate
//! builds on (`aead`), deterministic name encryption and its on-disk
//! layout (`name`), and the outbound/inbound adapters that apply all of
//! the above to `FileInfo`s and Requests (`adapter`).

pub mod adapter;
pub mod aead;
pub mod error;
pub mod keys;
pub mod name;

pub use adapter::{encrypt_file_info, pad_response, real_block_window, EncryptedFileInfo, InboundAdapter, BLOCK_OVERHEAD, MIN_PADDED_SIZE};
pub use aead::{open_deterministic, open_random, seal_deterministic, seal_random, RANDOM_AEAD_OVERHEAD, RANDOM_NONCE_LEN};
pub use error::CryptoError;
pub use keys::{file_key, folder_key, password_token, FileKey, FolderKey};
pub use name::{decode_path, encode_path, is_encrypted_path, MAX_PATH_COMPONENT};
