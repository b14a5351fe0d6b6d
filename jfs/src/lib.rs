//!A jumbo file system: single-level directories and append-only files
//!layered on top of a fixed-size block store
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod batch;
mod bitmap;
mod block_dev;
mod block_store;
mod directory;
mod error;
mod inode;
mod jfs;
mod layout;
mod vfs;

#[cfg(test)]
mod testing;

pub use block_dev::{BlockDevice, MemoryDevice};
pub use block_store::{BitmapStore, BlockStore};
pub use directory::Listing;
pub use error::{DeviceError, FsError, FsResult};
pub use jfs::{JumboFileSystem, Stats};
pub use layout::BlockKind;

/// Size of one block in bytes
pub const BLOCK_SZ: usize = 512;
/// Max length of an entry name, in bytes
pub const MAX_NAME_LENGTH: usize = 27;
/// Max number of entries a directory node can hold
pub const MAX_DIR_ENTRIES: usize = 15;
/// Max number of data blocks a file can reference
pub const MAX_DATA_BLOCKS: usize = 120;
/// Max size of a file in bytes
pub const MAX_FILE_SIZE: usize = MAX_DATA_BLOCKS * BLOCK_SZ;
/// The permanent root directory block
pub const ROOT_BLOCK_ID: BlockId = 1;

/// Handle of a block on the block store
pub type BlockId = u32;
/// Raw contents of one block
pub type DataBlock = [u8; BLOCK_SZ];
