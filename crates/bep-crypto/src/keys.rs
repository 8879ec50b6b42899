//! Key derivation: folder key from a shared password, per-file key from
//! the folder key, and the password-proof token exchanged during setup.
//!
//! All functions are pure and deterministic; no caller-supplied randomness
//! is involved anywhere in this module.

use hkdf::Hkdf;
use scrypt::Params;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::aead::seal_deterministic;
use crate::error::CryptoError;

const SCRYPT_SALT_PREFIX: &[u8] = b"syncthing";
const HKDF_SALT: &[u8] = b"syncthing";
const TOKEN_PREFIX: &[u8] = b"syncthing";

/// scrypt cost parameter `N = 32768 = 2^15`.
const SCRYPT_LOG_N: u8 = 15;
/// scrypt block size `r = 8`.
const SCRYPT_R: u32 = 8;
/// scrypt parallelism `p = 1`.
const SCRYPT_P: u32 = 1;

/// A folder's 32-byte symmetric key, derived once per (password, folder)
/// pair. Zeroized on drop.
pub struct FolderKey([u8; 32]);

impl FolderKey {
    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for FolderKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A single file's 32-byte symmetric key, derived from its folder key and
/// name. Zeroized on drop.
pub struct FileKey([u8; 32]);

impl FileKey {
    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Derive a folder key: `scrypt(password, "syncthing" || folder_id, N=32768, r=8, p=1, dkLen=32)`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidParams`] only if the fixed cost
/// parameters above were ever changed to something scrypt rejects.
pub fn folder_key(password: &str, folder_id: &str) -> Result<FolderKey, CryptoError> {
    let mut salt = Vec::with_capacity(SCRYPT_SALT_PREFIX.len() + folder_id.len());
    salt.extend_from_slice(SCRYPT_SALT_PREFIX);
    salt.extend_from_slice(folder_id.as_bytes());

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

    let mut out = [0u8; 32];
    scrypt::scrypt(password.as_bytes(), &salt, &params, &mut out)
        .map_err(|_| CryptoError::InvalidOutputLength)?;
    Ok(FolderKey(out))
}

/// Derive a per-file key: `HKDF-SHA256(ikm = folder_key || filename, salt = "syncthing", info = "", L=32)`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidOutputLength`] only in the unreachable
/// case of a broken HKDF expansion length.
pub fn file_key(folder_key: &FolderKey, filename: &str) -> Result<FileKey, CryptoError> {
    let mut ikm = Vec::with_capacity(32 + filename.len());
    ikm.extend_from_slice(folder_key.as_bytes());
    ikm.extend_from_slice(filename.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), &ikm);
    let mut out = [0u8; 32];
    hkdf.expand(b"", &mut out).map_err(|_| CryptoError::InvalidOutputLength)?;
    Ok(FileKey(out))
}

/// Derive the password-proof token sent to an encrypted-storage peer:
/// `AES-SIV("syncthing" || folder_id, folder_key)`, with no additional
/// data. The peer can recompute this from its own folder key to confirm
/// both sides share the same password without either side ever
/// transmitting it.
///
/// # Errors
///
/// Returns [`CryptoError`] only if the underlying AES-SIV cipher rejects
/// the fixed 32-byte key, which cannot happen in practice.
pub fn password_token(folder_key: &FolderKey, folder_id: &str) -> Result<Vec<u8>, CryptoError> {
    let mut plaintext = Vec::with_capacity(TOKEN_PREFIX.len() + folder_id.len());
    plaintext.extend_from_slice(TOKEN_PREFIX);
    plaintext.extend_from_slice(folder_id.as_bytes());
    seal_deterministic(folder_key.as_bytes(), &plaintext, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_key_is_deterministic() {
        let a = folder_key("hunter2", "folder-a").unwrap();
        let b = folder_key("hunter2", "folder-a").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn folder_key_differs_per_password() {
        let a = folder_key("hunter2", "folder-a").unwrap();
        let b = folder_key("correct-horse", "folder-a").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn folder_key_differs_per_folder() {
        let a = folder_key("hunter2", "folder-a").unwrap();
        let b = folder_key("hunter2", "folder-b").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn file_key_differs_per_filename() {
        let folder = folder_key("hunter2", "folder-a").unwrap();
        let a = file_key(&folder, "a.txt").unwrap();
        let b = file_key(&folder, "b.txt").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn password_token_matches_for_shared_secret() {
        let mine = folder_key("hunter2", "folder-a").unwrap();
        let theirs = folder_key("hunter2", "folder-a").unwrap();
        assert_eq!(
            password_token(&mine, "folder-a").unwrap(),
            password_token(&theirs, "folder-a").unwrap()
        );
    }

    #[test]
    fn password_token_differs_for_mismatched_password() {
        let mine = folder_key("hunter2", "folder-a").unwrap();
        let theirs = folder_key("wrong-password", "folder-a").unwrap();
        assert_ne!(
            password_token(&mine, "folder-a").unwrap(),
            password_token(&theirs, "folder-a").unwrap()
        );
    }
}
