/*!
    A mounted jumbo file system. The session owns the block store and the
    current directory; every operation resolves a single name inside that
    directory, re-reading the blocks it needs from the store.
*/
use crate::batch::BlockBatch;
use crate::layout::{classify, load_block, store_block, BlockKind, DirNode, DiskBlock, DiskInode};
use crate::{BlockId, BlockStore, DeviceError, FsError, FsResult, Listing, ROOT_BLOCK_ID};

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use log::{debug, info};

/// What `stat` reports about an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Block holding the directory node or inode
    pub block_id: BlockId,
    /// Entry name
    pub name: String,
    /// Directory or file
    pub kind: BlockKind,
    /// Size in bytes, 0 for directories
    pub file_size: usize,
    /// Number of data blocks, 0 for directories
    pub num_data_blocks: usize,
}

///A jumbo filesystem session on a block store
pub struct JumboFileSystem {
    store: Arc<dyn BlockStore>,
    current_dir: BlockId,
}

/* session lifecycle */
impl JumboFileSystem {
    ///Mount a block store whose root directory already exists.
    ///The session starts in the root directory.
    pub fn mount(store: Arc<dyn BlockStore>) -> FsResult<Self> {
        if classify(&*store, ROOT_BLOCK_ID)? != BlockKind::Directory {
            return Err(DeviceError::Malformed(ROOT_BLOCK_ID, "root directory").into());
        }
        info!("mounted, current directory is root");
        Ok(Self {
            store,
            current_dir: ROOT_BLOCK_ID,
        })
    }
    ///End the session and flush the block store
    pub fn unmount(self) -> FsResult<()> {
        self.store.sync()?;
        info!("unmounted");
        Ok(())
    }
    ///Block of the current directory
    pub fn current_dir(&self) -> BlockId {
        self.current_dir
    }
}

/* namespace operations */
impl JumboFileSystem {
    ///Create an empty subdirectory of the current directory
    pub fn mkdir(&self, name: &str) -> FsResult<()> {
        debug!("mkdir {:?}", name);
        self.link_new(name, |batch| {
            let block_id = batch.allocate()?;
            store_block(batch.store(), block_id, &DiskBlock::empty_directory())?;
            Ok(block_id)
        })?;
        Ok(())
    }
    ///Enter a subdirectory, or go back to the root with `None`
    pub fn chdir(&mut self, name: Option<&str>) -> FsResult<()> {
        debug!("chdir {:?}", name);
        let Some(name) = name else {
            self.current_dir = ROOT_BLOCK_ID;
            return Ok(());
        };
        let block_id = self.lookup(name)?.1;
        match classify(&*self.store, block_id)? {
            BlockKind::Directory => {
                self.current_dir = block_id;
                Ok(())
            }
            BlockKind::File => Err(FsError::NotADirectory),
        }
    }
    ///List the current directory, directories and files apart
    pub fn ls(&self) -> FsResult<Listing> {
        self.read_current_dir()?.list(&*self.store)
    }
    ///Remove an empty subdirectory of the current directory
    pub fn rmdir(&self, name: &str) -> FsResult<()> {
        debug!("rmdir {:?}", name);
        let (mut dir, block_id) = self.lookup(name)?;
        match load_block(&*self.store, block_id)? {
            DiskBlock::Inode(_) => return Err(FsError::NotADirectory),
            DiskBlock::Directory(child) if !child.is_empty() => return Err(FsError::NotEmpty),
            DiskBlock::Directory(_) => {}
        }
        // unlink first so a failed release leaks the block instead of leaving a dangling entry
        dir.remove(name)?;
        self.write_current_dir(&dir)?;
        self.store.release_block(block_id)?;
        Ok(())
    }
    ///Report block, kind and size of an entry
    pub fn stat(&self, name: &str) -> FsResult<Stats> {
        let block_id = self.lookup(name)?.1;
        let stats = match load_block(&*self.store, block_id)? {
            DiskBlock::Directory(_) => Stats {
                block_id,
                name: name.to_string(),
                kind: BlockKind::Directory,
                file_size: 0,
                num_data_blocks: 0,
            },
            DiskBlock::Inode(inode) => Stats {
                block_id,
                name: name.to_string(),
                kind: BlockKind::File,
                file_size: inode.size as usize,
                num_data_blocks: DiskInode::data_blocks_for(inode.size as usize),
            },
        };
        Ok(stats)
    }
}

/* helper methods */
impl JumboFileSystem {
    pub(crate) fn store(&self) -> &dyn BlockStore {
        &*self.store
    }

    pub(crate) fn read_current_dir(&self) -> FsResult<DirNode> {
        match load_block(&*self.store, self.current_dir)? {
            DiskBlock::Directory(dir) => Ok(dir),
            // the current directory was removed and its block reused
            DiskBlock::Inode(_) => Err(FsError::NotADirectory),
        }
    }

    pub(crate) fn write_current_dir(&self, dir: &DirNode) -> FsResult<()> {
        store_block(&*self.store, self.current_dir, &DiskBlock::Directory(dir.clone()))
    }
    /// Current directory and the block `name` points to
    pub(crate) fn lookup(&self, name: &str) -> FsResult<(DirNode, BlockId)> {
        let dir = self.read_current_dir()?;
        let block_id = dir.find(name).ok_or(FsError::NotFound)?;
        Ok((dir, block_id))
    }
    /**
        Create a child block with `init` and link it into the current directory
        under `name`. The directory block is written last; if anything fails
        the child block is released again.
    */
    pub(crate) fn link_new<'s>(
        &'s self,
        name: &str,
        init: impl FnOnce(&mut BlockBatch<'s>) -> FsResult<BlockId>,
    ) -> FsResult<BlockId> {
        let mut dir = self.read_current_dir()?;
        dir.check_insert(name)?;
        let mut batch = BlockBatch::new(&*self.store);
        let block_id = init(&mut batch)?;
        dir.insert(name, block_id)?;
        self.write_current_dir(&dir)?;
        batch.commit();
        Ok(block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fresh_store, FaultyStore};
    use crate::{MAX_DIR_ENTRIES, MAX_NAME_LENGTH};
    use alloc::format;
    use alloc::vec;
    use alloc::vec::Vec;

    fn mounted() -> (Arc<FaultyStore>, JumboFileSystem) {
        let store = Arc::new(FaultyStore::new(128));
        let fs = JumboFileSystem::mount(store.clone()).unwrap();
        (store, fs)
    }

    #[test]
    fn mount_starts_at_root() {
        let (_, fs) = mounted();
        assert_eq!(fs.current_dir(), ROOT_BLOCK_ID);
        assert_eq!(fs.ls().unwrap(), Listing::default());
        fs.unmount().unwrap();
    }

    #[test]
    fn mount_rejects_a_root_that_is_not_a_directory() {
        let store = fresh_store(16);
        store_block(&store, ROOT_BLOCK_ID, &DiskBlock::empty_inode()).unwrap();
        assert!(matches!(JumboFileSystem::mount(Arc::new(store)), Err(FsError::Unknown(_))));
    }

    #[test]
    fn mkdir_and_chdir() {
        let (_, mut fs) = mounted();
        fs.mkdir("docs").unwrap();
        fs.chdir(Some("docs")).unwrap();
        let docs = fs.current_dir();
        assert_ne!(docs, ROOT_BLOCK_ID);
        fs.mkdir("inner").unwrap();
        assert_eq!(fs.ls().unwrap().directories, vec!["inner"]);
        fs.chdir(None).unwrap();
        assert_eq!(fs.current_dir(), ROOT_BLOCK_ID);
        assert_eq!(fs.ls().unwrap().directories, vec!["docs"]);
        assert_eq!(fs.stat("docs").unwrap().block_id, docs);
    }

    #[test]
    fn names_are_unique_across_kinds() {
        let (_, fs) = mounted();
        fs.mkdir("x").unwrap();
        assert_eq!(fs.mkdir("x"), Err(FsError::AlreadyExists));
        assert_eq!(fs.creat("x"), Err(FsError::AlreadyExists));
        fs.creat("y").unwrap();
        assert_eq!(fs.mkdir("y"), Err(FsError::AlreadyExists));
        assert_eq!(fs.creat("y"), Err(FsError::AlreadyExists));
    }

    #[test]
    fn mkdir_limits() {
        let (store, fs) = mounted();
        assert_eq!(fs.mkdir(&"n".repeat(MAX_NAME_LENGTH + 1)), Err(FsError::NameTooLong));
        for i in 0..MAX_DIR_ENTRIES {
            fs.mkdir(&format!("d{}", i)).unwrap();
        }
        let free = store.free_blocks();
        assert_eq!(fs.mkdir("overflow"), Err(FsError::DirectoryFull));
        assert_eq!(store.free_blocks(), free);
    }

    #[test]
    fn mkdir_reports_disk_full() {
        let (store, fs) = mounted();
        store.fill_after(0);
        assert_eq!(fs.mkdir("docs"), Err(FsError::DiskFull));
        store.heal();
        assert!(fs.ls().unwrap().directories.is_empty());
    }

    #[test]
    fn mkdir_rolls_back_when_directory_write_fails() {
        let (store, fs) = mounted();
        let free = store.free_blocks();
        // the new node is written, the parent is not
        store.fail_writes_after(1);
        assert!(matches!(fs.mkdir("docs"), Err(FsError::Unknown(_))));
        store.heal();
        assert_eq!(store.free_blocks(), free);
        assert!(fs.ls().unwrap().directories.is_empty());
    }

    #[test]
    fn chdir_errors() {
        let (_, mut fs) = mounted();
        fs.creat("file").unwrap();
        assert_eq!(fs.chdir(Some("missing")), Err(FsError::NotFound));
        assert_eq!(fs.chdir(Some("file")), Err(FsError::NotADirectory));
        assert_eq!(fs.current_dir(), ROOT_BLOCK_ID);
    }

    #[test]
    fn ls_partitions_entries_in_insertion_order() {
        let (_, fs) = mounted();
        fs.creat("f1").unwrap();
        fs.mkdir("d1").unwrap();
        fs.creat("f2").unwrap();
        fs.mkdir("d2").unwrap();
        let listing = fs.ls().unwrap();
        assert_eq!(listing.directories, vec!["d1", "d2"]);
        assert_eq!(listing.files, vec!["f1", "f2"]);
    }

    #[test]
    fn rmdir_only_removes_empty_directories() {
        let (store, mut fs) = mounted();
        let free = store.free_blocks();
        fs.mkdir("docs").unwrap();
        fs.chdir(Some("docs")).unwrap();
        fs.mkdir("sub").unwrap();
        fs.chdir(None).unwrap();
        assert_eq!(fs.rmdir("docs"), Err(FsError::NotEmpty));
        fs.chdir(Some("docs")).unwrap();
        fs.rmdir("sub").unwrap();
        fs.chdir(None).unwrap();
        fs.rmdir("docs").unwrap();
        assert_eq!(fs.ls().unwrap(), Listing::default());
        assert_eq!(store.free_blocks(), free);
    }

    #[test]
    fn rmdir_errors() {
        let (_, fs) = mounted();
        fs.creat("file").unwrap();
        assert_eq!(fs.rmdir("missing"), Err(FsError::NotFound));
        assert_eq!(fs.rmdir("file"), Err(FsError::NotADirectory));
    }

    #[test]
    fn rmdir_keeps_the_entry_when_unlinking_fails() {
        let (store, fs) = mounted();
        fs.mkdir("docs").unwrap();
        store.fail_writes_after(0);
        assert!(matches!(fs.rmdir("docs"), Err(FsError::Unknown(_))));
        store.heal();
        assert_eq!(fs.ls().unwrap().directories, vec!["docs"]);
    }

    #[test]
    fn rmdir_unlinks_before_releasing() {
        let (store, fs) = mounted();
        fs.mkdir("docs").unwrap();
        store.fail_releases_after(0);
        assert!(matches!(fs.rmdir("docs"), Err(FsError::Unknown(_))));
        store.heal();
        assert!(fs.ls().unwrap().directories.is_empty());
        assert_eq!(fs.stat("docs"), Err(FsError::NotFound));
    }

    #[test]
    fn stat_reports_kind_and_size() {
        let (_, fs) = mounted();
        fs.mkdir("d").unwrap();
        fs.creat("f").unwrap();
        fs.write("f", &vec![7u8; 1000]).unwrap();

        let dir = fs.stat("d").unwrap();
        assert_eq!(dir.kind, BlockKind::Directory);
        assert_eq!((dir.file_size, dir.num_data_blocks), (0, 0));

        let file = fs.stat("f").unwrap();
        assert_eq!(file.name, "f");
        assert_eq!(file.kind, BlockKind::File);
        assert_eq!((file.file_size, file.num_data_blocks), (1000, 2));
        assert_eq!(fs.stat("nope"), Err(FsError::NotFound));
    }

    #[test]
    fn sessions_keep_their_own_current_directory() {
        let store: Arc<dyn BlockStore> = Arc::new(fresh_store(64));
        let mut a = JumboFileSystem::mount(Arc::clone(&store)).unwrap();
        let b = JumboFileSystem::mount(store).unwrap();
        a.mkdir("docs").unwrap();
        a.chdir(Some("docs")).unwrap();
        a.creat("note").unwrap();
        assert_eq!(b.current_dir(), ROOT_BLOCK_ID);
        assert_eq!(b.ls().unwrap().directories, vec!["docs"]);
        assert!(b.ls().unwrap().files.is_empty());
    }

    #[test]
    fn scenario() {
        let (store, mut fs) = mounted();
        let free = store.free_blocks();
        fs.mkdir("docs").unwrap();
        fs.chdir(Some("docs")).unwrap();
        fs.creat("a.txt").unwrap();
        fs.write("a.txt", b"hello").unwrap();
        assert_eq!(fs.read("a.txt", 100).unwrap(), b"hello");
        fs.chdir(None).unwrap();
        assert_eq!(fs.rmdir("docs"), Err(FsError::NotEmpty));
        fs.chdir(Some("docs")).unwrap();
        fs.remove("a.txt").unwrap();
        fs.chdir(None).unwrap();
        fs.rmdir("docs").unwrap();
        assert_eq!(store.free_blocks(), free);
        let names: Vec<String> = fs.ls().unwrap().files;
        assert!(names.is_empty());
        fs.unmount().unwrap();
    }
}
