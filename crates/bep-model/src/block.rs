//! Block-level file chunking: the size ladder used to pick a chop size for a
//! file, and the `BlockInfo` records that make up a file's block list.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Smallest block size in the ladder: 128 KiB.
pub const MIN_BLOCK_SIZE: u32 = 128 * 1024;

/// Largest block size in the ladder: 16 MiB.
pub const MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// Target number of blocks a file should be chopped into; `block_size`
/// picks the smallest ladder size that keeps a file under this count.
pub const DESIRED_PER_FILE_BLOCKS: u64 = 2000;

/// The block-size ladder: powers of two from [`MIN_BLOCK_SIZE`] through
/// [`MAX_BLOCK_SIZE`].
pub const BLOCK_SIZE_LADDER: [u32; 8] = [
    128 * 1024,
    256 * 1024,
    512 * 1024,
    1024 * 1024,
    2 * 1024 * 1024,
    4 * 1024 * 1024,
    8 * 1024 * 1024,
    16 * 1024 * 1024,
];

/// A single block within a file's block list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Digest of this block's contents, typically 32 bytes (SHA-256).
    pub hash: Vec<u8>,
    /// Byte offset of this block within the file.
    pub offset: i64,
    /// Size of this block in bytes.
    pub size: i32,
}

/// Pick the block size to chop a file of `file_size` bytes into: the
/// smallest ladder entry such that `file_size < DESIRED_PER_FILE_BLOCKS *
/// block_size`. Files large enough to exceed even [`MAX_BLOCK_SIZE`] under
/// that rule still use [`MAX_BLOCK_SIZE`].
#[must_use]
pub fn block_size(file_size: u64) -> u32 {
    for &size in &BLOCK_SIZE_LADDER {
        if file_size < DESIRED_PER_FILE_BLOCKS * u64::from(size) {
            return size;
        }
    }
    MAX_BLOCK_SIZE
}

/// Precomputed SHA-256 digest of an all-zero block of `size` bytes, for the
/// sparse-file fast path where a block is known to be all zeroes without
/// reading it.
#[must_use]
pub fn zero_block_hash(size: u32) -> Vec<u8> {
    let zeros = vec![0u8; size as usize];
    Sha256::digest(&zeros).to_vec()
}

/// Precomputed all-zero block digests for every rung of the ladder, in
/// ladder order.
#[must_use]
pub fn zero_block_hashes() -> Vec<Vec<u8>> {
    BLOCK_SIZE_LADDER.iter().map(|&size| zero_block_hash(size)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_uses_min_block_size() {
        assert_eq!(block_size(1), MIN_BLOCK_SIZE);
        assert_eq!(block_size(0), MIN_BLOCK_SIZE);
    }

    #[test]
    fn huge_file_uses_max_block_size() {
        assert_eq!(block_size(u64::MAX / 2), MAX_BLOCK_SIZE);
    }

    #[test]
    fn picks_smallest_size_satisfying_desired_count() {
        // Just under the threshold for 128 KiB blocks.
        let threshold = DESIRED_PER_FILE_BLOCKS * u64::from(MIN_BLOCK_SIZE);
        assert_eq!(block_size(threshold - 1), MIN_BLOCK_SIZE);
        assert_eq!(block_size(threshold), 256 * 1024);
    }

    #[test]
    fn zero_block_hash_is_deterministic_and_sized() {
        let a = zero_block_hash(MIN_BLOCK_SIZE);
        let b = zero_block_hash(MIN_BLOCK_SIZE);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn zero_block_hashes_cover_whole_ladder() {
        let hashes = zero_block_hashes();
        assert_eq!(hashes.len(), BLOCK_SIZE_LADDER.len());
        // Every rung must produce a distinct digest.
        for i in 0..hashes.len() {
            for j in (i + 1)..hashes.len() {
                assert_ne!(hashes[i], hashes[j]);
            }
        }
    }
}
