//! Errors produced by key derivation, AEAD sealing/opening, and encrypted
//! name encoding.

use thiserror::Error;

/// Failures specific to the encryption wrapper.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// scrypt's cost parameters were rejected (should never happen with
    /// this module's fixed parameters).
    #[error("invalid scrypt parameters: {0}")]
    InvalidParams(String),

    /// HKDF's requested output length exceeds what SHA-256 can expand to.
    #[error("invalid HKDF output length")]
    InvalidOutputLength,

    /// Authenticated decryption failed: wrong key, wrong additional data,
    /// or tampered ciphertext.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A sealed buffer was too short to contain a nonce and a tag.
    #[error("sealed data too short: {len} bytes")]
    Truncated {
        /// The length actually supplied.
        len: usize,
    },

    /// An on-disk encrypted path did not match the expected structural
    /// shape.
    #[error("not an encrypted path: {0}")]
    NotEncryptedPath(String),
}
