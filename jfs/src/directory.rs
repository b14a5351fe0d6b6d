/*!
    Directory manager: lookup, insertion, removal and listing of the
    entries of one directory node. Everything here works on a node that is
    already in memory; callers persist it afterwards.
*/
use crate::layout::{classify, BlockKind, DirEntry, DirNode};
use crate::{BlockId, BlockStore, FsError, FsResult, MAX_DIR_ENTRIES, MAX_NAME_LENGTH};

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Names in a directory, split by kind, each in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Entries that are directory nodes
    pub directories: Vec<String>,
    /// Entries that are files
    pub files: Vec<String>,
}

impl DirNode {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Find the child block of `name`, exact match
    pub fn find(&self, name: &str) -> Option<BlockId> {
        self.entries
            .iter()
            .find(|entry| entry.name() == name)
            .map(DirEntry::block_id)
    }
    /// Check that `name` could be inserted, without touching the node
    pub fn check_insert(&self, name: &str) -> FsResult<()> {
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(FsError::NameTooLong);
        }
        if self.entries.len() >= MAX_DIR_ENTRIES {
            return Err(FsError::DirectoryFull);
        }
        Ok(())
    }
    /// Append a new entry, which shows up last in listings
    pub fn insert(&mut self, name: &str, block_id: BlockId) -> FsResult<()> {
        self.check_insert(name)?;
        self.entries.push(DirEntry::new(name, block_id));
        Ok(())
    }
    /// Remove an entry, later entries move up by one
    pub fn remove(&mut self, name: &str) -> FsResult<BlockId> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.name() == name)
            .ok_or(FsError::NotFound)?;
        Ok(self.entries.remove(pos).block_id())
    }
    /// Classify every entry by reading its block
    pub fn list(&self, store: &dyn BlockStore) -> FsResult<Listing> {
        let mut listing = Listing::default();
        for entry in &self.entries {
            let bucket = match classify(store, entry.block_id())? {
                BlockKind::Directory => &mut listing.directories,
                BlockKind::File => &mut listing.files,
            };
            bucket.push(entry.name().to_string());
        }
        Ok(listing)
    }
}
