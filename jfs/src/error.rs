//! Error taxonomy of the file system and of the block store beneath it
use crate::BlockId;

use alloc::string::String;
use thiserror::Error;

/// Failure of the block store or of the data it returned
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The handle lies beyond the end of the device
    #[error("block {0} is out of range")]
    OutOfRange(BlockId),
    /// The handle belongs to the store's own metadata
    #[error("block {0} is reserved")]
    Reserved(BlockId),
    /// Released a block that was never allocated
    #[error("block {0} is not allocated")]
    NotAllocated(BlockId),
    /// The block contents do not decode
    #[error("block {0} holds a malformed {1}")]
    Malformed(BlockId, &'static str),
    /// The superblock does not carry the jumbo-fs magic number
    #[error("bad superblock magic {0:#x}")]
    BadMagic(u32),
    /// The backing storage failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Outcome of a failed file system operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Unexpected failure of an underlying block operation
    #[error("block store failure: {0}")]
    Unknown(#[from] DeviceError),
    /// An entry with this name already exists
    #[error("entry already exists")]
    AlreadyExists,
    /// No entry with this name
    #[error("no such entry")]
    NotFound,
    /// The entry is a file where a directory was expected
    #[error("not a directory")]
    NotADirectory,
    /// The entry is a directory where a file was expected
    #[error("is a directory")]
    IsADirectory,
    /// The directory still has entries
    #[error("directory not empty")]
    NotEmpty,
    /// The name is longer than `MAX_NAME_LENGTH`
    #[error("name too long")]
    NameTooLong,
    /// The directory already holds `MAX_DIR_ENTRIES` entries
    #[error("directory full")]
    DirectoryFull,
    /// The write would grow the file beyond `MAX_FILE_SIZE`
    #[error("file too large")]
    FileTooLarge,
    /// The block store has no free block left
    #[error("disk full")]
    DiskFull,
}

/// Result type for file system operations
pub type FsResult<T> = Result<T, FsError>;
