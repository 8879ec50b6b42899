//! Device identity: a 32-byte certificate hash with a Luhn-checked base32
//! textual form.
//!
//! The canonical string form groups the base32 encoding into four 13-char
//! chunks, each followed by a mod-32 Luhn check character, and inserts `-`
//! every 7 characters for readability. Parsing is tolerant of the common
//! typos this induces (lower-case, missing separators, `0`/`1`/`8` confused
//! with `O`/`I`/`B`).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alphabet used both for the base32 encoding and the Luhn mod-32 check
/// digit. This is RFC 4648's base32 alphabet, which is also the alphabet
/// syncthing's `luhn32` check borrows.
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Reserved "local" sentinel: all bytes `0xFF`.
pub const LOCAL_DEVICE_ID: DeviceID = DeviceID([0xFF; 32]);

/// Reserved "empty" sentinel: all bytes zero.
pub const EMPTY_DEVICE_ID: DeviceID = DeviceID([0; 32]);

/// Errors produced while parsing a textual device ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceIdError {
    /// Cleaned-up input was neither 52 (unchecked) nor 56 (checked) chars.
    #[error("invalid device ID length: {0} chars after cleanup")]
    InvalidLength(usize),

    /// Input contained a character outside the tolerant alphabet.
    #[error("invalid device ID encoding")]
    InvalidEncoding,
}

/// 32-byte device identity, normally SHA-256 of a peer's certificate DER.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceID(pub [u8; 32]);

/// First 8 bytes of a [`DeviceID`], interpreted big-endian, used inside
/// version vectors where a full 32-byte ID would be wasteful.
pub type ShortID = u64;

impl DeviceID {
    /// Wrap a raw 32-byte certificate hash.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The [`ShortID`] used inside version vectors: the first 8 bytes,
    /// big-endian.
    #[must_use]
    pub fn short(&self) -> ShortID {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }

    /// Whether this is the reserved "local" sentinel (all `0xFF`).
    #[must_use]
    pub fn is_local(&self) -> bool {
        *self == LOCAL_DEVICE_ID
    }

    /// Whether this is the reserved "empty" sentinel (all zero).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == EMPTY_DEVICE_ID
    }

    /// Render the canonical, Luhn-checked, dash-grouped textual form.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        let base32 = data_encoding::BASE32_NOPAD.encode(&self.0);
        debug_assert_eq!(base32.len(), 52);

        let mut checked = String::with_capacity(56);
        for chunk in base32.as_bytes().chunks(13) {
            // SAFETY-free: base32 output is ASCII.
            let chunk_str = std::str::from_utf8(chunk).unwrap_or_default();
            checked.push_str(chunk_str);
            checked.push(luhn32_check_char(chunk_str));
        }

        let mut out = String::with_capacity(checked.len() + checked.len() / 7);
        for (i, ch) in checked.chars().enumerate() {
            if i > 0 && i % 7 == 0 {
                out.push('-');
            }
            out.push(ch);
        }
        out
    }

    /// Parse a textual device ID, tolerating the typos a human is likely to
    /// introduce: lower-case letters, missing `-` separators, and `0`/`1`/`8`
    /// typed instead of `O`/`I`/`B`. Accepts both the 52-char unchecked form
    /// and the 56-char Luhn-checked form (check characters are stripped, not
    /// verified, matching the tolerant-parse contract in the spec).
    pub fn parse(input: &str) -> Result<Self, DeviceIdError> {
        let mut cleaned = String::with_capacity(input.len());
        for ch in input.chars() {
            if ch == '-' || ch.is_whitespace() {
                continue;
            }
            let upper = ch.to_ascii_uppercase();
            let mapped = match upper {
                '0' => 'O',
                '1' => 'I',
                '8' => 'B',
                other => other,
            };
            cleaned.push(mapped);
        }

        let unchecked = match cleaned.len() {
            52 => cleaned,
            56 => {
                let mut out = String::with_capacity(52);
                for group in cleaned.as_bytes().chunks(14) {
                    if group.len() != 14 {
                        return Err(DeviceIdError::InvalidLength(cleaned.len()));
                    }
                    let body = std::str::from_utf8(&group[..13])
                        .map_err(|_| DeviceIdError::InvalidEncoding)?;
                    out.push_str(body);
                }
                out
            },
            other => return Err(DeviceIdError::InvalidLength(other)),
        };

        let bytes = data_encoding::BASE32_NOPAD
            .decode(unchecked.as_bytes())
            .map_err(|_| DeviceIdError::InvalidEncoding)?;

        if bytes.len() != 32 {
            return Err(DeviceIdError::InvalidLength(bytes.len()));
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

/// Compute the Luhn mod-32 check character for a 13-char base32 chunk.
fn luhn32_check_char(chunk: &str) -> char {
    let n = ALPHABET.len() as u32;
    let mut factor = 1u32;
    let mut sum = 0u32;

    for byte in chunk.bytes() {
        let Some(codepoint) = ALPHABET.iter().position(|&c| c == byte) else {
            continue;
        };
        let mut addend = factor * codepoint as u32;
        factor = if factor == 2 { 1 } else { 2 };
        addend = (addend / n) + (addend % n);
        sum += addend;
    }

    let remainder = sum % n;
    let check_codepoint = (n - remainder) % n;
    ALPHABET[check_codepoint as usize] as char
}

impl fmt::Display for DeviceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl fmt::Debug for DeviceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceID({})", self.to_display_string())
    }
}
