//! Deterministic name encryption and the on-disk path layout an
//! encrypted-storage peer uses to avoid ever seeing a plaintext filename.

use crate::aead::{open_deterministic, seal_deterministic};
use crate::error::CryptoError;
use crate::keys::FolderKey;

/// Longest a single path component (besides the two fixed prefix
/// components) may be.
pub const MAX_PATH_COMPONENT: usize = 200;

const ENCRYPTED_SUFFIX: &str = ".syncthing-enc";

/// Encrypt `name` with the folder key and lay it out as an on-disk path:
/// `X.syncthing-enc/YY/ZZZ…` where `X` is the encoded data's first
/// character, `YY` its next two, and the remainder is chunked into
/// [`MAX_PATH_COMPONENT`]-character pieces.
///
/// # Errors
///
/// Propagates [`CryptoError`] from the underlying AES-SIV seal, which in
/// practice cannot fail for a fixed 32-byte key.
pub fn encode_path(name: &str, folder_key: &FolderKey) -> Result<String, CryptoError> {
    let ciphertext = seal_deterministic(folder_key.as_bytes(), name.as_bytes(), &[])?;
    let encoded = data_encoding::BASE32HEX_NOPAD.encode(&ciphertext);
    Ok(split_into_path(&encoded))
}

fn split_into_path(encoded: &str) -> String {
    let mut chars = encoded.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut components = vec![format!("{first}{ENCRYPTED_SUFFIX}")];
    let second: String = chars.by_ref().take(2).collect();
    components.push(second);

    let remainder: String = chars.collect();
    components.extend(chunk_string(&remainder, MAX_PATH_COMPONENT));

    components.join("/")
}

fn chunk_string(s: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

/// Recover the name [`encode_path`] encrypted into `path`.
///
/// # Errors
///
/// Returns [`CryptoError::NotEncryptedPath`] if `path` doesn't have the
/// structural shape [`is_encrypted_path`] expects, or
/// [`CryptoError::AuthenticationFailed`] if `folder_key` is wrong.
pub fn decode_path(path: &str, folder_key: &FolderKey) -> Result<String, CryptoError> {
    if !is_encrypted_path(path) {
        return Err(CryptoError::NotEncryptedPath(path.to_string()));
    }

    let components: Vec<&str> = path.split('/').collect();
    let first = components[0];
    let prefix_len = first.len() - ENCRYPTED_SUFFIX.len();

    let mut encoded = String::with_capacity(path.len());
    encoded.push_str(&first[..prefix_len]);
    for component in &components[1..] {
        encoded.push_str(component);
    }

    let ciphertext = data_encoding::BASE32HEX_NOPAD
        .decode(encoded.as_bytes())
        .map_err(|_| CryptoError::NotEncryptedPath(path.to_string()))?;
    let plaintext = open_deterministic(folder_key.as_bytes(), &ciphertext, &[])?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::AuthenticationFailed)
}

/// Whether `path` has the structural shape an encrypted name produces:
/// `<char>.syncthing-enc/<2 chars>/<200 chars>/…/<≤200 chars>`. Purely
/// structural — it never attempts to decrypt anything.
#[must_use]
pub fn is_encrypted_path(path: &str) -> bool {
    let components: Vec<&str> = path.split('/').collect();
    let [first, second, rest @ ..] = components.as_slice() else {
        return false;
    };

    if !first.ends_with(ENCRYPTED_SUFFIX) {
        return false;
    }
    let prefix_len = first.len() - ENCRYPTED_SUFFIX.len();
    if first[..prefix_len].chars().count() != 1 {
        return false;
    }
    if second.chars().count() != 2 {
        return false;
    }

    rest.iter().enumerate().all(|(i, component)| {
        let len = component.chars().count();
        let is_last = i == rest.len() - 1;
        len == MAX_PATH_COMPONENT || (is_last && len <= MAX_PATH_COMPONENT)
    })
}
