use crate::{BlockId, DataBlock, DeviceError, BLOCK_SZ};

use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;
use spin::Mutex;

/// BlockDevice is implemented by outer jumbo-fs user
pub trait BlockDevice: Send + Sync + Any {
    /// read one whole block from the device into `buf`
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError>;
    /// write one whole block to the device
    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError>;
    /// push buffered writes down to persistent storage
    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// A block device living in memory, mostly useful for tests
pub struct MemoryDevice {
    blocks: Mutex<Vec<DataBlock>>,
}

impl MemoryDevice {
    /// Create a zero-filled device of `total_blocks` blocks
    pub fn new(total_blocks: u32) -> Self {
        Self {
            blocks: Mutex::new(vec![[0u8; BLOCK_SZ]; total_blocks as usize]),
        }
    }
}

impl BlockDevice for MemoryDevice {
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError> {
        let blocks = self.blocks.lock();
        let block = blocks
            .get(block_id as usize)
            .ok_or(DeviceError::OutOfRange(block_id))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError> {
        let mut blocks = self.blocks.lock();
        let block = blocks
            .get_mut(block_id as usize)
            .ok_or(DeviceError::OutOfRange(block_id))?;
        block.copy_from_slice(buf);
        Ok(())
    }
}
