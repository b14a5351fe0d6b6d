//! Helpers shared by the unit tests
use crate::{BitmapStore, BlockDevice, BlockId, BlockStore, DataBlock, DeviceError, MemoryDevice};

use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

pub fn fresh_store(total_blocks: u32) -> BitmapStore {
    let device: Arc<dyn BlockDevice> = Arc::new(MemoryDevice::new(total_blocks));
    BitmapStore::format(device, total_blocks).unwrap()
}

/// Remaining successful calls before an operation starts failing
struct Countdown(AtomicUsize);

impl Countdown {
    const NEVER: usize = usize::MAX;

    fn new() -> Self {
        Self(AtomicUsize::new(Self::NEVER))
    }

    fn set(&self, successes: usize) {
        self.0.store(successes, Ordering::SeqCst);
    }

    fn tick(&self) -> bool {
        match self.0.load(Ordering::SeqCst) {
            Self::NEVER => true,
            0 => false,
            left => {
                self.0.store(left - 1, Ordering::SeqCst);
                true
            }
        }
    }
}

/// A `BitmapStore` that starts failing chosen operations on demand
pub struct FaultyStore {
    inner: BitmapStore,
    reads: Countdown,
    writes: Countdown,
    allocs: Countdown,
    releases: Countdown,
}

impl FaultyStore {
    pub fn new(total_blocks: u32) -> Self {
        Self {
            inner: fresh_store(total_blocks),
            reads: Countdown::new(),
            writes: Countdown::new(),
            allocs: Countdown::new(),
            releases: Countdown::new(),
        }
    }

    pub fn fail_reads_after(&self, successes: usize) {
        self.reads.set(successes);
    }

    pub fn fail_writes_after(&self, successes: usize) {
        self.writes.set(successes);
    }

    /// Report the store full after `successes` more allocations
    pub fn fill_after(&self, successes: usize) {
        self.allocs.set(successes);
    }

    pub fn fail_releases_after(&self, successes: usize) {
        self.releases.set(successes);
    }

    pub fn heal(&self) {
        for countdown in [&self.reads, &self.writes, &self.allocs, &self.releases] {
            countdown.set(Countdown::NEVER);
        }
    }

    pub fn free_blocks(&self) -> usize {
        self.inner.free_blocks().unwrap()
    }
}

fn injected() -> DeviceError {
    DeviceError::Io(String::from("injected fault"))
}

impl BlockStore for FaultyStore {
    fn read_block(&self, block_id: BlockId, buf: &mut DataBlock) -> Result<(), DeviceError> {
        if !self.reads.tick() {
            return Err(injected());
        }
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: BlockId, buf: &DataBlock) -> Result<(), DeviceError> {
        if !self.writes.tick() {
            return Err(injected());
        }
        self.inner.write_block(block_id, buf)
    }

    fn allocate_block(&self) -> Result<Option<BlockId>, DeviceError> {
        if !self.allocs.tick() {
            return Ok(None);
        }
        self.inner.allocate_block()
    }

    fn release_block(&self, block_id: BlockId) -> Result<(), DeviceError> {
        if !self.releases.tick() {
            return Err(injected());
        }
        self.inner.release_block(block_id)
    }

    fn sync(&self) -> Result<(), DeviceError> {
        self.inner.sync()
    }
}
