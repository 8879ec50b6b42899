//! Data model primitives for the Block Exchange Protocol.
//!
//! This crate has no I/O and no async runtime dependency: it defines
//! [`DeviceID`]/[`ShortID`], version [`Vector`]s, the block-size ladder, and
//! [`FileInfo`] together with its validation, equivalence, and
//! conflict-resolution rules. Higher layers (`bep-proto`, `bep-core`,
//! `bep-crypto`) build the wire protocol and session machinery on top of
//! these types.

pub mod block;
pub mod device_id;
pub mod file_info;
pub mod vector;

pub use block::{
    block_size, zero_block_hash, zero_block_hashes, BlockInfo, BLOCK_SIZE_LADDER,
    DESIRED_PER_FILE_BLOCKS, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
pub use device_id::{DeviceID, DeviceIdError, ShortID, EMPTY_DEVICE_ID, LOCAL_DEVICE_ID};
pub use file_info::{
    equivalent, resolve_conflict, to_native_name_darwin, to_wire_name, validate_name,
    EquivalenceOptions, FileInfo, FileInfoError, FileType, NameError, Platform,
};
pub use vector::{Counter, Vector, VectorOrdering};
