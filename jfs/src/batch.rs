//! Tentatively allocated blocks, released on drop unless committed
use crate::{BlockId, BlockStore, FsError, FsResult};

use alloc::vec::Vec;
use log::warn;

pub struct BlockBatch<'a> {
    store: &'a dyn BlockStore,
    blocks: Vec<BlockId>,
}

impl<'a> BlockBatch<'a> {
    pub fn new(store: &'a dyn BlockStore) -> Self {
        Self {
            store,
            blocks: Vec::new(),
        }
    }
    /// Allocate one more block into the batch
    pub fn allocate(&mut self) -> FsResult<BlockId> {
        let block_id = self.store.allocate_block()?.ok_or(FsError::DiskFull)?;
        self.blocks.push(block_id);
        Ok(block_id)
    }
    /// Allocate `count` blocks; on failure the whole batch is released when dropped
    pub fn allocate_many(&mut self, count: usize) -> FsResult<()> {
        self.blocks.reserve(count);
        for _ in 0..count {
            self.allocate()?;
        }
        Ok(())
    }

    pub fn store(&self) -> &'a dyn BlockStore {
        self.store
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
    /// The blocks are now referenced from a persisted block and stay allocated
    pub fn commit(mut self) -> Vec<BlockId> {
        core::mem::take(&mut self.blocks)
    }
}

impl Drop for BlockBatch<'_> {
    fn drop(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        warn!("rolling back {} tentatively allocated blocks", self.blocks.len());
        for block_id in self.blocks.drain(..) {
            if let Err(err) = self.store.release_block(block_id) {
                warn!("block {} leaked during rollback: {}", block_id, err);
            }
        }
    }
}
