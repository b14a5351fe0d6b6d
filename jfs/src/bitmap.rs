//! Allocation bitmap, one bit per block of the device
use crate::{BlockDevice, BlockId, DeviceError, BLOCK_SZ};

use alloc::sync::Arc;

const BLOCK_BITS: usize = BLOCK_SZ * 8;

/// Area for the allocation bitmap
pub struct Bitmap {
    start_block_id: BlockId,
    blocks: u32,
    /// bits past this one map to no block and are never handed out
    total_bits: u32,
}

impl Bitmap {
    pub fn new(start_block_id: BlockId, blocks: u32, total_bits: u32) -> Self {
        Self {
            start_block_id,
            blocks,
            total_bits,
        }
    }
    /// Number of bitmap blocks needed to track `total_bits` blocks
    pub fn blocks_for(total_bits: u32) -> u32 {
        ((total_bits as usize + BLOCK_BITS - 1) / BLOCK_BITS) as u32
    }
    /**
        Allocate the lowest free bit:
            *return: the bit, which is also the global block id on the device,
             or `None` when every bit is taken
    */
    pub fn alloc(&self, block_device: &Arc<dyn BlockDevice>) -> Result<Option<BlockId>, DeviceError> {
        let mut bitmap_block = [0u8; BLOCK_SZ];
        for inner_id in 0..self.blocks {
            let block_id = self.start_block_id + inner_id;
            block_device.read_block(block_id, &mut bitmap_block)?;
            let found = bitmap_block
                .iter()
                .enumerate()
                .find(|(_, bits8)| **bits8 != u8::MAX)
                .map(|(bits8_pos, bits8)| (bits8_pos, bits8.trailing_ones() as usize));
            if let Some((bits8_pos, inner_pos)) = found {
                let bit = inner_id as usize * BLOCK_BITS + bits8_pos * 8 + inner_pos;
                // every lower bit is taken, so the device is full
                if bit >= self.total_bits as usize {
                    return Ok(None);
                }
                bitmap_block[bits8_pos] |= 1u8 << inner_pos;
                block_device.write_block(block_id, &bitmap_block)?;
                return Ok(Some(bit as BlockId));
            }
        }
        Ok(None)
    }
    /// Mark `bit` as taken, used when formatting to reserve metadata blocks
    pub fn set(&self, block_device: &Arc<dyn BlockDevice>, bit: BlockId) -> Result<(), DeviceError> {
        let (block_id, bits8_pos, inner_pos) = self.decomposition(bit)?;
        let mut bitmap_block = [0u8; BLOCK_SZ];
        block_device.read_block(block_id, &mut bitmap_block)?;
        bitmap_block[bits8_pos] |= 1u8 << inner_pos;
        block_device.write_block(block_id, &bitmap_block)
    }
    /// Deallocate a bit, which must be allocated
    pub fn dealloc(&self, block_device: &Arc<dyn BlockDevice>, bit: BlockId) -> Result<(), DeviceError> {
        let (block_id, bits8_pos, inner_pos) = self.decomposition(bit)?;
        let mut bitmap_block = [0u8; BLOCK_SZ];
        block_device.read_block(block_id, &mut bitmap_block)?;
        if bitmap_block[bits8_pos] & (1u8 << inner_pos) == 0 {
            return Err(DeviceError::NotAllocated(bit));
        }
        bitmap_block[bits8_pos] &= !(1u8 << inner_pos);
        block_device.write_block(block_id, &bitmap_block)
    }
    /// Count the bits still free
    pub fn count_free(&self, block_device: &Arc<dyn BlockDevice>) -> Result<usize, DeviceError> {
        let mut bitmap_block = [0u8; BLOCK_SZ];
        let mut free = 0;
        for inner_id in 0..self.blocks {
            block_device.read_block(self.start_block_id + inner_id, &mut bitmap_block)?;
            let first_bit = inner_id as usize * BLOCK_BITS;
            let bits_here = (self.total_bits as usize - first_bit).min(BLOCK_BITS);
            free += (0..bits_here)
                .filter(|bit| bitmap_block[bit / 8] & (1u8 << (bit % 8)) == 0)
                .count();
        }
        Ok(free)
    }
    /// Get the max number of allocatable blocks
    pub fn maximum(&self) -> usize {
        self.total_bits as usize
    }
    /// Decompose `bit` into (bitmap block id, bits8_pos, inner_pos)
    fn decomposition(&self, bit: BlockId) -> Result<(BlockId, usize, usize), DeviceError> {
        if bit >= self.total_bits {
            return Err(DeviceError::OutOfRange(bit));
        }
        let bit = bit as usize;
        let block_pos = (bit / BLOCK_BITS) as BlockId;
        let bit_in_block = bit % BLOCK_BITS;
        Ok((self.start_block_id + block_pos, bit_in_block / 8, bit_in_block % 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDevice;

    fn device(blocks: u32) -> Arc<dyn BlockDevice> {
        Arc::new(MemoryDevice::new(blocks))
    }

    #[test]
    fn alloc_hands_out_lowest_free_bit() {
        let dev = device(4);
        let bitmap = Bitmap::new(0, 1, 20);
        bitmap.set(&dev, 0).unwrap();
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(1));
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(2));
        bitmap.dealloc(&dev, 1).unwrap();
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(1));
        assert_eq!(bitmap.count_free(&dev).unwrap(), 17);
    }

    #[test]
    fn alloc_stops_at_total_bits() {
        let dev = device(2);
        let bitmap = Bitmap::new(1, 1, 3);
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(0));
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(1));
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(2));
        assert_eq!(bitmap.alloc(&dev).unwrap(), None);
        assert_eq!(bitmap.count_free(&dev).unwrap(), 0);
    }

    #[test]
    fn alloc_spans_bitmap_blocks() {
        let total = BLOCK_BITS as u32 + 8;
        let dev = device(3);
        let bitmap = Bitmap::new(1, Bitmap::blocks_for(total), total);
        assert_eq!(Bitmap::blocks_for(total), 2);
        for bit in 0..BLOCK_BITS as u32 {
            bitmap.set(&dev, bit).unwrap();
        }
        assert_eq!(bitmap.alloc(&dev).unwrap(), Some(BLOCK_BITS as u32));
        assert_eq!(bitmap.count_free(&dev).unwrap(), 7);
    }

    #[test]
    fn dealloc_rejects_free_bit() {
        let dev = device(1);
        let bitmap = Bitmap::new(0, 1, 16);
        assert_eq!(bitmap.dealloc(&dev, 5), Err(DeviceError::NotAllocated(5)));
        assert_eq!(bitmap.dealloc(&dev, 16), Err(DeviceError::OutOfRange(16)));
    }
}
