//! Two authenticated-encryption primitives: random-nonce `XChaCha20-
//! Poly1305` for the wire, and deterministic AES-SIV for names and
//! block-hash tokens.
//!
//! As in the teacher's own AEAD module, these are pure functions: callers
//! supply any randomness, which keeps tests deterministic.

use aead::{Aead, Key, KeyInit, Nonce, Payload};
use aes_siv::Aes128SivAead;
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use crate::error::CryptoError;

/// Nonce length for the random-nonce AEAD, in bytes.
pub const RANDOM_NONCE_LEN: usize = 24;
/// Total overhead (nonce + Poly1305 tag) the random-nonce AEAD adds to a
/// plaintext.
pub const RANDOM_AEAD_OVERHEAD: usize = 40;

/// Seal `plaintext` with `XChaCha20-Poly1305`, prepending `nonce` to the
/// ciphertext. `key` must be 32 bytes.
///
/// # Security
///
/// The caller MUST supply a fresh, unpredictable `nonce` for every call
/// under the same key; this function performs no nonce management of its
/// own.
pub fn seal_random(key: &[u8; 32], plaintext: &[u8], nonce: [u8; RANDOM_NONCE_LEN]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::<XChaCha20Poly1305>::from_slice(key));
    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut out = Vec::with_capacity(RANDOM_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out
}

/// Open a buffer produced by [`seal_random`].
///
/// # Errors
///
/// Returns [`CryptoError::Truncated`] if `sealed` is shorter than a nonce,
/// or [`CryptoError::AuthenticationFailed`] if the key is wrong or the
/// data was tampered with.
pub fn open_random(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < RANDOM_NONCE_LEN {
        return Err(CryptoError::Truncated { len: sealed.len() });
    }
    let (nonce, ciphertext) = sealed.split_at(RANDOM_NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::<XChaCha20Poly1305>::from_slice(key));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Seal `plaintext` deterministically with AES-SIV: the same
/// `(key, additional_data, plaintext)` triple always produces the same
/// ciphertext, which is what makes this suitable for encrypting names and
/// block-hash tokens (where the insecure peer must recognize repeats).
/// `key` must be 32 bytes.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] only in the unreachable
/// case of the underlying cipher rejecting a well-formed input.
pub fn seal_deterministic(
    key: &[u8; 32],
    plaintext: &[u8],
    additional_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128SivAead::new(Key::<Aes128SivAead>::from_slice(key));
    cipher
        .encrypt(&Nonce::<Aes128SivAead>::default(), Payload { msg: plaintext, aad: additional_data })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Open a buffer produced by [`seal_deterministic`] with the same
/// `additional_data`.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] if the key or additional
/// data is wrong, or the ciphertext was tampered with.
pub fn open_deterministic(
    key: &[u8; 32],
    sealed: &[u8],
    additional_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128SivAead::new(Key::<Aes128SivAead>::from_slice(key));
    cipher
        .decrypt(&Nonce::<Aes128SivAead>::default(), Payload { msg: sealed, aad: additional_data })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_round_trips() {
        let key = [7u8; 32];
        let nonce = [1u8; RANDOM_NONCE_LEN];
        let sealed = seal_random(&key, b"hello block", nonce);
        let opened = open_random(&key, &sealed).unwrap();
        assert_eq!(opened, b"hello block");
    }

    #[test]
    fn random_overhead_matches_constant() {
        let key = [7u8; 32];
        let nonce = [1u8; RANDOM_NONCE_LEN];
        let sealed = seal_random(&key, b"abc", nonce);
        assert_eq!(sealed.len() - "abc".len(), RANDOM_AEAD_OVERHEAD);
    }

    #[test]
    fn random_wrong_key_fails() {
        let sealed = seal_random(&[7u8; 32], b"abc", [1u8; RANDOM_NONCE_LEN]);
        assert!(open_random(&[8u8; 32], &sealed).is_err());
    }

    #[test]
    fn random_truncated_input_is_rejected() {
        assert!(matches!(open_random(&[0u8; 32], &[0u8; 4]), Err(CryptoError::Truncated { len: 4 })));
    }

    #[test]
    fn deterministic_same_inputs_produce_same_ciphertext() {
        let key = [3u8; 32];
        let a = seal_deterministic(&key, b"folder/file.txt", b"").unwrap();
        let b = seal_deterministic(&key, b"folder/file.txt", b"").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_round_trips_with_additional_data() {
        let key = [3u8; 32];
        let offset = 4096u64.to_be_bytes();
        let sealed = seal_deterministic(&key, b"block-hash-token", &offset).unwrap();
        let opened = open_deterministic(&key, &sealed, &offset).unwrap();
        assert_eq!(opened, b"block-hash-token");
    }

    #[test]
    fn deterministic_wrong_additional_data_fails() {
        let key = [3u8; 32];
        let sealed = seal_deterministic(&key, b"payload", &1u64.to_be_bytes()).unwrap();
        assert!(open_deterministic(&key, &sealed, &2u64.to_be_bytes()).is_err());
    }

    #[test]
    fn deterministic_differs_per_plaintext() {
        let key = [3u8; 32];
        let a = seal_deterministic(&key, b"a.txt", b"").unwrap();
        let b = seal_deterministic(&key, b"b.txt", b"").unwrap();
        assert_ne!(a, b);
    }
}
