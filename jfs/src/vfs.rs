/*!
    File operations of a mounted jumbo file system: create, remove,
    append-only write and read-from-start.
*/
use crate::inode::Inode;
use crate::{FsResult, JumboFileSystem};

use alloc::vec::Vec;
use log::debug;

/*
    jumbo-fs users will support file-related operations
    using the following methods.
*/
impl JumboFileSystem {
    ///Create an empty file in the current directory
    pub fn creat(&self, name: &str) -> FsResult<()> {
        debug!("creat {:?}", name);
        self.link_new(name, |batch| Inode::create(batch))?;
        Ok(())
    }
    ///Delete a file and all its data blocks
    pub fn remove(&self, name: &str) -> FsResult<()> {
        debug!("remove {:?}", name);
        let (mut dir, block_id) = self.lookup(name)?;
        let inode = Inode::open(self.store(), block_id)?;
        // unlink first so a failed release leaks blocks instead of leaving a dangling entry
        dir.remove(name)?;
        self.write_current_dir(&dir)?;
        inode.destroy()
    }
    ///Append `buf` to the end of a file
    pub fn write(&self, name: &str, buf: &[u8]) -> FsResult<()> {
        debug!("write {:?}, {} bytes", name, buf.len());
        let block_id = self.lookup(name)?.1;
        Inode::open(self.store(), block_id)?.append(buf)
    }
    ///Read at most `max_bytes` from the start of a file.
    ///The returned buffer may be shorter than requested.
    pub fn read(&self, name: &str, max_bytes: usize) -> FsResult<Vec<u8>> {
        let block_id = self.lookup(name)?.1;
        let data = Inode::open(self.store(), block_id)?.read(max_bytes)?;
        debug!("read {:?}, {} of {} bytes", name, data.len(), max_bytes);
        Ok(data)
    }
}
