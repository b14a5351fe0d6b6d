/*!
    Inode manager: creation, destruction, append-only growth and
    sequential reads of a file's data blocks.

    Possible chains of function calls:
    [(vfs)JumboFileSystem::write(name, buf)]
            +-> [Inode::append]
                    +-> [BlockBatch::allocate_many]
                    +-> [store_block(inode)]
*/
use crate::batch::BlockBatch;
use crate::layout::{load_block, store_block, DiskBlock, DiskInode};
use crate::{BlockId, BlockStore, FsError, FsResult, BLOCK_SZ, MAX_FILE_SIZE};

use alloc::vec::Vec;
use log::debug;

/// A loaded file inode together with the store it lives on
pub struct Inode<'a> {
    block_id: BlockId,
    store: &'a dyn BlockStore,
    disk_inode: DiskInode,
}

impl<'a> Inode<'a> {
    pub fn new(store: &'a dyn BlockStore, block_id: BlockId, disk_inode: DiskInode) -> Self {
        Self {
            block_id,
            store,
            disk_inode,
        }
    }
    /// Allocate and persist an empty inode; it stays in `batch` until the caller links it
    pub fn create(batch: &mut BlockBatch<'a>) -> FsResult<BlockId> {
        let block_id = batch.allocate()?;
        store_block(batch.store(), block_id, &DiskBlock::empty_inode())?;
        Ok(block_id)
    }
    /// Load the inode stored at `block_id`, which must be a file
    pub fn open(store: &'a dyn BlockStore, block_id: BlockId) -> FsResult<Self> {
        match load_block(store, block_id)? {
            DiskBlock::Inode(disk_inode) => Ok(Self::new(store, block_id, disk_inode)),
            DiskBlock::Directory(_) => Err(FsError::IsADirectory),
        }
    }

    pub fn size(&self) -> usize {
        self.disk_inode.size as usize
    }

    /// Release every data block in chunk order, then the inode block itself
    pub fn destroy(self) -> FsResult<()> {
        for block_id in &self.disk_inode.data_blocks {
            self.store.release_block(*block_id)?;
        }
        self.store.release_block(self.block_id)?;
        debug!("destroyed inode {}", self.block_id);
        Ok(())
    }
    /**
        Append `buf` to the end of the file.
        A partially filled last chunk is completed in place: its first bytes are
        written back unchanged, so the persisted inode stays valid whatever
        fails afterwards. Only the remainder of `buf` needs fresh blocks, and
        those are released again unless the updated inode is persisted.
    */
    pub fn append(&mut self, buf: &[u8]) -> FsResult<()> {
        let old_size = self.size();
        let new_size = old_size + buf.len();
        if new_size > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge);
        }
        if buf.is_empty() {
            return Ok(());
        }
        let fill = old_size % BLOCK_SZ;
        let (head, rest) = if fill > 0 {
            buf.split_at(buf.len().min(BLOCK_SZ - fill))
        } else {
            (&buf[..0], buf)
        };

        let mut batch = BlockBatch::new(self.store);
        batch.allocate_many(DiskInode::data_blocks_for(rest.len()))?;
        for (chunk, block_id) in rest.chunks(BLOCK_SZ).zip(batch.blocks()) {
            let mut data = [0u8; BLOCK_SZ];
            data[..chunk.len()].copy_from_slice(chunk);
            self.store.write_block(*block_id, &data)?;
        }
        if !head.is_empty() {
            let last = self.disk_inode.data_blocks[old_size / BLOCK_SZ];
            let mut data = [0u8; BLOCK_SZ];
            self.store.read_block(last, &mut data)?;
            data[fill..fill + head.len()].copy_from_slice(head);
            self.store.write_block(last, &data)?;
        }

        let mut updated = self.disk_inode.clone();
        updated.data_blocks.extend_from_slice(batch.blocks());
        updated.size = new_size as u32;
        store_block(self.store, self.block_id, &DiskBlock::Inode(updated.clone()))?;
        batch.commit();
        self.disk_inode = updated;
        debug!("inode {} grew {} -> {} bytes", self.block_id, old_size, new_size);
        Ok(())
    }
    /// Read up to `max_bytes` from the start of the file
    pub fn read(&self, max_bytes: usize) -> FsResult<Vec<u8>> {
        let len = self.size().min(max_bytes);
        let mut out = Vec::with_capacity(len);
        let mut chunk = [0u8; BLOCK_SZ];
        for block_id in &self.disk_inode.data_blocks[..DiskInode::data_blocks_for(len)] {
            self.store.read_block(*block_id, &mut chunk)?;
            let take = (len - out.len()).min(BLOCK_SZ);
            out.extend_from_slice(&chunk[..take]);
        }
        Ok(out)
    }
}
