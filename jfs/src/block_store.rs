/*!
    The block store hands out, persists and takes back whole blocks.
    The file system only sees the `BlockStore` trait; `BitmapStore` is the
    implementation shipped with the crate, tracking free blocks in a bitmap.
*/
use crate::bitmap::Bitmap;
use crate::layout::DiskBlock;
use crate::{BlockDevice, BlockId, DataBlock, DeviceError, BLOCK_SZ, ROOT_BLOCK_ID};

use alloc::sync::Arc;
use core::any::Any;
use core::fmt::{Debug, Formatter, Result as FmtResult};
use log::{debug, info};
use spin::Mutex;

/// The four block primitives the file system is built on, plus `sync`
pub trait BlockStore: Send + Sync + Any {
    /// Fill `buf` with the persisted contents of `block_id`
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError>;
    /// Persist `buf` at `block_id`
    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError>;
    /// Return a fresh zero-valued block, or `None` if the store is full
    fn allocate_block(&self) -> Result<Option<BlockId>, DeviceError>;
    /// Mark `block_id` free for future allocation
    fn release_block(&self, block_id: BlockId) -> Result<(), DeviceError>;
    /// Flush everything to persistent storage, called on unmount
    fn sync(&self) -> Result<(), DeviceError>;
}

// Magic number for sanity check
const JFS_MAGIC: u32 = 0x4a46_5301;
const SUPER_BLOCK_ID: BlockId = 0;
const BITMAP_START_BLOCK: BlockId = ROOT_BLOCK_ID + 1;

/**
    [SuperBlock_Description]:
    Block 0 of the device. Block 1 is the root directory and the bitmap
    follows right after it; everything else is allocatable.
*/
struct SuperBlock {
    magic: u32,
    total_blocks: u32,
    bitmap_blocks: u32,
}

impl Debug for SuperBlock {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("SuperBlock")
            .field("total_blocks", &self.total_blocks)
            .field("bitmap_blocks", &self.bitmap_blocks)
            .finish()
    }
}

impl SuperBlock {
    fn new(total_blocks: u32, bitmap_blocks: u32) -> Self {
        Self {
            magic: JFS_MAGIC,
            total_blocks,
            bitmap_blocks,
        }
    }

    fn encode(&self) -> DataBlock {
        let mut block = [0u8; BLOCK_SZ];
        block[0..4].copy_from_slice(&self.magic.to_le_bytes());
        block[4..8].copy_from_slice(&self.total_blocks.to_le_bytes());
        block[8..12].copy_from_slice(&self.bitmap_blocks.to_le_bytes());
        block
    }

    fn decode(block: &DataBlock) -> Result<Self, DeviceError> {
        let word = |at: usize| u32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]]);
        let super_block = Self {
            magic: word(0),
            total_blocks: word(4),
            bitmap_blocks: word(8),
        };
        if super_block.magic != JFS_MAGIC {
            return Err(DeviceError::BadMagic(super_block.magic));
        }
        if super_block.bitmap_blocks != Bitmap::blocks_for(super_block.total_blocks) {
            return Err(DeviceError::Malformed(SUPER_BLOCK_ID, "superblock"));
        }
        Ok(super_block)
    }

    /// Blocks below this id belong to the store itself
    fn reserved_blocks(&self) -> u32 {
        BITMAP_START_BLOCK + self.bitmap_blocks
    }
}

/// A block store over a `BlockDevice`, with free blocks tracked in a bitmap
pub struct BitmapStore {
    block_device: Arc<dyn BlockDevice>,
    bitmap: Mutex<Bitmap>,
    super_block: SuperBlock,
}

impl BitmapStore {
    /// Lay out a fresh store on `block_device`, with an empty root directory
    pub fn format(block_device: Arc<dyn BlockDevice>, total_blocks: u32) -> Result<Self, DeviceError> {
        let super_block = SuperBlock::new(total_blocks, Bitmap::blocks_for(total_blocks));
        let reserved = super_block.reserved_blocks();
        if total_blocks <= reserved {
            return Err(DeviceError::OutOfRange(total_blocks));
        }
        // initialize with zero
        let zero = [0u8; BLOCK_SZ];
        for block_id in 0..total_blocks {
            block_device.write_block(block_id, &zero)?;
        }
        block_device.write_block(SUPER_BLOCK_ID, &super_block.encode())?;
        let bitmap = Bitmap::new(BITMAP_START_BLOCK, super_block.bitmap_blocks, total_blocks);
        for block_id in 0..reserved {
            bitmap.set(&block_device, block_id)?;
        }
        block_device.write_block(ROOT_BLOCK_ID, &DiskBlock::empty_directory().encode())?;
        block_device.flush()?;
        info!("formatted {:?}, {} blocks reserved", super_block, reserved);
        Ok(Self {
            block_device,
            bitmap: Mutex::new(bitmap),
            super_block,
        })
    }
    /// Open a block device that already holds a formatted store
    pub fn open(block_device: Arc<dyn BlockDevice>) -> Result<Self, DeviceError> {
        let mut block = [0u8; BLOCK_SZ];
        block_device.read_block(SUPER_BLOCK_ID, &mut block)?;
        let super_block = SuperBlock::decode(&block)?;
        let bitmap = Bitmap::new(
            BITMAP_START_BLOCK,
            super_block.bitmap_blocks,
            super_block.total_blocks,
        );
        info!("opened {:?}", super_block);
        Ok(Self {
            block_device,
            bitmap: Mutex::new(bitmap),
            super_block,
        })
    }
    /// Number of blocks on the device, metadata included
    pub fn total_blocks(&self) -> u32 {
        self.bitmap.lock().maximum() as u32
    }
    /// Number of blocks still available to `allocate_block`
    pub fn free_blocks(&self) -> Result<usize, DeviceError> {
        self.bitmap.lock().count_free(&self.block_device)
    }

    fn check_range(&self, block_id: BlockId) -> Result<(), DeviceError> {
        if block_id >= self.super_block.total_blocks {
            return Err(DeviceError::OutOfRange(block_id));
        }
        Ok(())
    }

    fn is_metadata(&self, block_id: BlockId) -> bool {
        block_id == SUPER_BLOCK_ID
            || (BITMAP_START_BLOCK..self.super_block.reserved_blocks()).contains(&block_id)
    }
}

impl BlockStore for BitmapStore {
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError> {
        self.check_range(block_id)?;
        self.block_device.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError> {
        self.check_range(block_id)?;
        if self.is_metadata(block_id) {
            return Err(DeviceError::Reserved(block_id));
        }
        self.block_device.write_block(block_id, buf)
    }

    fn allocate_block(&self) -> Result<Option<BlockId>, DeviceError> {
        let block_id = self.bitmap.lock().alloc(&self.block_device)?;
        debug!("allocate_block -> {:?}", block_id);
        Ok(block_id)
    }

    fn release_block(&self, block_id: BlockId) -> Result<(), DeviceError> {
        self.check_range(block_id)?;
        if block_id < self.super_block.reserved_blocks() {
            return Err(DeviceError::Reserved(block_id));
        }
        let bitmap = self.bitmap.lock();
        // released blocks are zeroed so the next allocation hands out a clean one
        self.block_device.write_block(block_id, &[0u8; BLOCK_SZ])?;
        bitmap.dealloc(&self.block_device, block_id)?;
        debug!("release_block {}", block_id);
        Ok(())
    }

    fn sync(&self) -> Result<(), DeviceError> {
        self.block_device.flush()
    }
}
