use crate::{
    BlockId, BlockStore, DataBlock, DeviceError, FsResult, BLOCK_SZ, MAX_DATA_BLOCKS,
    MAX_DIR_ENTRIES, MAX_FILE_SIZE, MAX_NAME_LENGTH,
};

use alloc::string::String;
use alloc::vec::Vec;

/* Wire layout of a block, all integers little-endian */
// Kind tag at byte 0
const DIR_TAG: u8 = 0;
const INODE_TAG: u8 = 1;
// Directory node: entry count at [2..4], entries from byte 4
const DIR_COUNT_OFFSET: usize = 2;
const DIR_ENTRIES_OFFSET: usize = 4;
const DIR_ENTRY_SZ: usize = 32; // 1 + 27 + 4
// Inode: file size at [4..8], data block ids from byte 8
const INODE_SIZE_OFFSET: usize = 4;
const INODE_BLOCKS_OFFSET: usize = 8;

const _: () = assert!(DIR_ENTRIES_OFFSET + MAX_DIR_ENTRIES * DIR_ENTRY_SZ <= BLOCK_SZ);
const _: () = assert!(INODE_BLOCKS_OFFSET + MAX_DATA_BLOCKS * 4 <= BLOCK_SZ);
const _: () = assert!(1 + MAX_NAME_LENGTH + 4 == DIR_ENTRY_SZ);

/// What a block holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A directory node
    Directory,
    /// A file inode
    File,
}

/// One (name, child block) pair of a directory node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: String,
    block_id: BlockId,
}

impl DirEntry {
    pub fn new(name: &str, block_id: BlockId) -> Self {
        Self {
            name: String::from(name),
            block_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

/**
    [DirNode_Description]:
    The contents of a directory, an insertion-ordered sequence of
    at most `MAX_DIR_ENTRIES` entries with pairwise distinct names.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    pub(crate) entries: Vec<DirEntry>,
}

/**
    [DiskInode_Description]:
    Each file is stored as a DiskInode: its byte size and one data block
    per `BLOCK_SZ` chunk, with no gaps.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInode {
    pub size: u32,
    pub data_blocks: Vec<BlockId>,
}

impl DiskInode {
    /// Number of data blocks needed to hold `size` bytes
    pub fn data_blocks_for(size: usize) -> usize {
        (size + BLOCK_SZ - 1) / BLOCK_SZ
    }
}

/// A decoded block: every block is exactly one of the two kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskBlock {
    Directory(DirNode),
    Inode(DiskInode),
}

impl DiskBlock {
    pub fn empty_directory() -> Self {
        DiskBlock::Directory(DirNode::default())
    }

    pub fn empty_inode() -> Self {
        DiskBlock::Inode(DiskInode::default())
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            DiskBlock::Directory(_) => BlockKind::Directory,
            DiskBlock::Inode(_) => BlockKind::File,
        }
    }

    /// Serialize into a whole block, unused bytes are zero
    pub fn encode(&self) -> DataBlock {
        let mut block = [0u8; BLOCK_SZ];
        match self {
            DiskBlock::Directory(dir) => {
                block[0] = DIR_TAG;
                block[DIR_COUNT_OFFSET..DIR_ENTRIES_OFFSET]
                    .copy_from_slice(&(dir.entries.len() as u16).to_le_bytes());
                for (i, entry) in dir.entries.iter().enumerate() {
                    let raw = &mut block[DIR_ENTRIES_OFFSET + i * DIR_ENTRY_SZ..][..DIR_ENTRY_SZ];
                    let name = entry.name.as_bytes();
                    raw[0] = name.len() as u8;
                    raw[1..1 + name.len()].copy_from_slice(name);
                    raw[1 + MAX_NAME_LENGTH..].copy_from_slice(&entry.block_id.to_le_bytes());
                }
            }
            DiskBlock::Inode(inode) => {
                block[0] = INODE_TAG;
                block[INODE_SIZE_OFFSET..INODE_BLOCKS_OFFSET].copy_from_slice(&inode.size.to_le_bytes());
                for (i, block_id) in inode.data_blocks.iter().enumerate() {
                    block[INODE_BLOCKS_OFFSET + i * 4..][..4].copy_from_slice(&block_id.to_le_bytes());
                }
            }
        }
        block
    }

    /// Deserialize the raw contents of block `block_id`
    pub fn decode(block_id: BlockId, block: &DataBlock) -> Result<Self, DeviceError> {
        match block[0] {
            DIR_TAG => {
                let count = u16::from_le_bytes([block[DIR_COUNT_OFFSET], block[DIR_COUNT_OFFSET + 1]]) as usize;
                if count > MAX_DIR_ENTRIES {
                    return Err(DeviceError::Malformed(block_id, "directory node"));
                }
                let entries = block[DIR_ENTRIES_OFFSET..]
                    .chunks_exact(DIR_ENTRY_SZ)
                    .take(count)
                    .map(|raw| {
                        let len = raw[0] as usize;
                        if len > MAX_NAME_LENGTH {
                            return Err(DeviceError::Malformed(block_id, "directory entry"));
                        }
                        let name = core::str::from_utf8(&raw[1..1 + len])
                            .map_err(|_| DeviceError::Malformed(block_id, "directory entry"))?;
                        Ok(DirEntry::new(name, read_u32(raw, 1 + MAX_NAME_LENGTH)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DiskBlock::Directory(DirNode { entries }))
            }
            INODE_TAG => {
                let size = read_u32(block, INODE_SIZE_OFFSET);
                if size as usize > MAX_FILE_SIZE {
                    return Err(DeviceError::Malformed(block_id, "inode"));
                }
                let data_blocks = (0..DiskInode::data_blocks_for(size as usize))
                    .map(|i| read_u32(block, INODE_BLOCKS_OFFSET + i * 4))
                    .collect();
                Ok(DiskBlock::Inode(DiskInode { size, data_blocks }))
            }
            _ => Err(DeviceError::Malformed(block_id, "block tag")),
        }
    }
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

/// Read and decode one block
pub fn load_block(store: &dyn BlockStore, block_id: BlockId) -> FsResult<DiskBlock> {
    let mut raw = [0u8; BLOCK_SZ];
    store.read_block(block_id, &mut raw)?;
    Ok(DiskBlock::decode(block_id, &raw)?)
}

/// Encode and persist one block
pub fn store_block(store: &dyn BlockStore, block_id: BlockId, block: &DiskBlock) -> FsResult<()> {
    store.write_block(block_id, &block.encode())?;
    Ok(())
}

/// Block classifier: tell whether `block_id` holds a directory node or an inode
pub fn classify(store: &dyn BlockStore, block_id: BlockId) -> FsResult<BlockKind> {
    load_block(store, block_id).map(|block| block.kind())
}
