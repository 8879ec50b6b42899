//! `FileInfo`: the per-file metadata record exchanged inside Index,
//! IndexUpdate, Request and Response messages, along with filename
//! validation, equivalence, and conflict resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::{is_nfc, UnicodeNormalization};

use crate::block::BlockInfo;
use crate::device_id::ShortID;
use crate::vector::{Vector, VectorOrdering};

/// Smallest permitted `raw_block_size`; smaller values on the wire are
/// canonicalized up to this floor.
pub const MIN_BLOCK_SIZE: i32 = crate::block::MIN_BLOCK_SIZE as i32;

/// `FileInfo.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Deprecated: symlink known to target a file. Kept for wire
    /// compatibility with old peers; treated as [`FileType::Symlink`].
    DeprecatedSymlinkFile,
    /// Deprecated: symlink known to target a directory. Same treatment.
    DeprecatedSymlinkDirectory,
}

impl FileType {
    /// Whether this is any symlink variant, including the deprecated ones.
    #[must_use]
    pub fn is_symlink(self) -> bool {
        matches!(
            self,
            Self::Symlink | Self::DeprecatedSymlinkFile | Self::DeprecatedSymlinkDirectory
        )
    }
}

/// Host-local flags (never transmitted on the wire).
pub mod local_flags {
    /// The local database considers this entry unsupported.
    pub const FLAG_LOCAL_UNSUPPORTED: u32 = 1 << 0;
    /// The local scanner could not finish and this entry needs a rescan.
    pub const FLAG_LOCAL_MUST_RESCAN: u32 = 1 << 1;
    /// The entry is locally ignored by pattern matching.
    pub const FLAG_LOCAL_IGNORED: u32 = 1 << 2;
    /// Catch-all mask of every "invalid" local flag.
    pub const FLAG_LOCAL_INVALID: u32 =
        FLAG_LOCAL_UNSUPPORTED | FLAG_LOCAL_MUST_RESCAN | FLAG_LOCAL_IGNORED;
}

/// A single file, directory, or symlink record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Folder-relative, slash-separated, NFC-normalized name.
    pub name: String,
    /// Logical size in bytes; zero for deleted entries.
    pub size: i64,
    /// Modification time, Unix seconds component.
    pub modified_s: i64,
    /// Modification time, nanoseconds component.
    pub modified_ns: i32,
    /// Device that most recently changed this entry.
    pub modified_by: ShortID,
    /// Causal version vector.
    pub version: Vector,
    /// Per-device monotonic change counter.
    pub sequence: i64,
    /// Block list; empty for directories, symlinks, and deleted entries.
    pub blocks: Vec<BlockInfo>,
    /// Symlink target, only meaningful when `type` is a symlink variant.
    pub symlink_target: Vec<u8>,
    /// Optional digest of the block list.
    pub blocks_hash: Vec<u8>,
    /// Entry kind.
    pub file_type: FileType,
    /// POSIX-style permission bits.
    pub permissions: u32,
    /// Block size used to chop this file; canonicalized to ≥ `MinBlockSize`.
    pub raw_block_size: i32,
    /// Tombstone marker.
    pub deleted: bool,
    /// When set, permission bits are ignored in comparisons.
    pub no_permissions: bool,
    /// Host-local only; never transmitted.
    pub local_flags: u32,
}

impl FileInfo {
    /// Whether any local-invalid flag is set.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.local_flags & local_flags::FLAG_LOCAL_INVALID != 0
    }

    /// Whether [`local_flags::FLAG_LOCAL_MUST_RESCAN`] is set.
    #[must_use]
    pub fn must_rescan(&self) -> bool {
        self.local_flags & local_flags::FLAG_LOCAL_MUST_RESCAN != 0
    }
}

/// A wire-level invariant violation; receiving this on Index/IndexUpdate is
/// a protocol error that must close the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileInfoError {
    /// `name` failed filename validation.
    #[error("invalid filename: {0}")]
    InvalidName(#[from] NameError),
    /// `deleted` was set but `blocks` was non-empty.
    #[error("deleted entry carries blocks")]
    DeletedWithBlocks,
    /// `type == Directory` but `blocks` was non-empty.
    #[error("directory entry carries blocks")]
    DirectoryWithBlocks,
    /// A non-deleted, non-invalid regular file carried no blocks.
    #[error("file entry has no blocks")]
    FileWithoutBlocks,
}

/// A filename failed the wire validation rules in §4.3.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name was empty, `"."`, or `".."`.
    #[error("empty or dot name")]
    EmptyOrDot,
    /// Name began with `/` or `../`.
    #[error("name escapes the folder root")]
    EscapesRoot,
    /// Name was not already in its canonical cleaned form.
    #[error("name is not in canonical form")]
    NotCanonical,
}

/// Validate a wire-carried `name` per §4.3: non-empty, not `.`/`..`, not
/// rooted or escaping, and already equal to its own cleaned form (no `.`/
/// `..` segments, no duplicate or trailing slashes).
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(NameError::EmptyOrDot);
    }
    if name.starts_with('/') || name.starts_with("../") {
        return Err(NameError::EscapesRoot);
    }

    let segments: Vec<&str> = name.split('/').collect();
    for segment in &segments {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            return Err(NameError::NotCanonical);
        }
    }
    if name.ends_with('/') {
        return Err(NameError::NotCanonical);
    }

    Ok(())
}

/// Normalize a locally-sourced name to the wire form: NFC, forward slashes.
/// `\` is left untouched — it is not a separator on the wire.
#[must_use]
pub fn to_wire_name(native: &str) -> String {
    if is_nfc(native) {
        native.to_string()
    } else {
        native.nfc().collect()
    }
}

/// Rewrite a wire-received name to NFD for local use on Darwin. Other
/// platforms use the wire form (NFC) directly.
#[must_use]
pub fn to_native_name_darwin(wire: &str) -> String {
    wire.nfd().collect()
}

impl FileInfo {
    /// Check the four wire invariants from §3. Returns the first violation
    /// found.
    pub fn check_invariants(&self) -> Result<(), FileInfoError> {
        validate_name(&self.name)?;

        if self.deleted && !self.blocks.is_empty() {
            return Err(FileInfoError::DeletedWithBlocks);
        }
        if self.file_type == FileType::Directory && !self.blocks.is_empty() {
            return Err(FileInfoError::DirectoryWithBlocks);
        }
        if self.file_type == FileType::File
            && !self.deleted
            && !self.is_invalid()
            && self.blocks.is_empty()
        {
            return Err(FileInfoError::FileWithoutBlocks);
        }

        Ok(())
    }
}

/// Target platform for permission-bit comparison in [`equivalent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Compare only the user-writable bit (`& 0o600`).
    Windows,
    /// Compare the full permission bits (`& 0o777`).
    Other,
}

/// Options controlling [`equivalent`]'s behavior.
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceOptions {
    /// Platform to use for permission-bit masking.
    pub platform: Platform,
    /// Whether permission bits are ignored altogether (folder-level config).
    pub ignore_permissions: bool,
    /// Modification-time comparison window, in whole seconds.
    pub modified_window_s: i64,
}

impl Default for EquivalenceOptions {
    fn default() -> Self {
        Self {
            platform: Platform::Other,
            ignore_permissions: false,
            modified_window_s: 0,
        }
    }
}

/// Whether two `FileInfo`s represent the same content and metadata, per
/// §4.7: no local action is needed to reconcile one into the other.
#[must_use]
pub fn equivalent(a: &FileInfo, b: &FileInfo, opts: EquivalenceOptions) -> bool {
    if a.must_rescan() || b.must_rescan() {
        return false;
    }
    if a.name != b.name || a.file_type != b.file_type || a.deleted != b.deleted {
        return false;
    }
    if a.is_invalid() != b.is_invalid() {
        return false;
    }

    if !opts.ignore_permissions && !a.no_permissions && !b.no_permissions {
        let mask: u32 = match opts.platform {
            Platform::Windows => 0o600,
            Platform::Other => 0o777,
        };
        if a.permissions & mask != b.permissions & mask {
            return false;
        }
    }

    match a.file_type {
        FileType::File => {
            if a.size != b.size {
                return false;
            }
            if (a.modified_s - b.modified_s).abs() > opts.modified_window_s {
                return false;
            }
            if !a.blocks_hash.is_empty() && !b.blocks_hash.is_empty() {
                if a.blocks_hash != b.blocks_hash {
                    return false;
                }
            } else if a.blocks != b.blocks {
                return false;
            }
            true
        },
        FileType::Directory => true,
        FileType::Symlink
        | FileType::DeprecatedSymlinkFile
        | FileType::DeprecatedSymlinkDirectory => a.symlink_target == b.symlink_target,
    }
}

/// Pick the conflict winner between two `FileInfo`s that share a name, per
/// the cascade in §4.6: valid beats invalid, non-deleted beats deleted,
/// newer `modified` wins, and a version-vector tie-break as the last
/// resort.
#[must_use]
pub fn resolve_conflict<'a>(a: &'a FileInfo, b: &'a FileInfo) -> &'a FileInfo {
    let a_invalid = a.is_invalid();
    let b_invalid = b.is_invalid();
    if a_invalid != b_invalid {
        return if a_invalid { b } else { a };
    }

    if a.deleted != b.deleted {
        return if a.deleted { b } else { a };
    }

    match a.modified_s.cmp(&b.modified_s) {
        std::cmp::Ordering::Greater => return a,
        std::cmp::Ordering::Less => return b,
        std::cmp::Ordering::Equal => {},
    }
    match a.modified_ns.cmp(&b.modified_ns) {
        std::cmp::Ordering::Greater => return a,
        std::cmp::Ordering::Less => return b,
        std::cmp::Ordering::Equal => {},
    }

    match a.version.compare(&b.version) {
        VectorOrdering::ConcurrentGreater => a,
        _ => b,
    }
}
