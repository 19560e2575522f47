#![allow(dead_code)]

use kernel_bcache::{BLOCK_SIZE, BlockData, BlockId, BlockStore, BufferCache, Direction};
use kernel_sync::HostScheduler;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache with the kernel's geometry over an in-memory disk.
pub type Cache<'d> = BufferCache<&'d MemDisk, HostScheduler>;

/// Cache with a custom geometry.
pub type SmallCache<'d, const NBUF: usize, const NBUCKET: usize> =
    BufferCache<&'d MemDisk, HostScheduler, NBUF, NBUCKET>;

/// Deterministic contents of a block that was never written.
pub fn pattern(block: BlockId) -> BlockData {
    let mut data = [0; BLOCK_SIZE];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (block.dev as usize * 31 + block.blockno as usize * 7 + i) as u8;
    }
    data
}

/// In-memory block device that counts transfers.
#[derive(Default)]
pub struct MemDisk {
    written: Mutex<HashMap<BlockId, BlockData>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self, block: BlockId) -> BlockData {
        self.written
            .lock()
            .unwrap()
            .get(&block)
            .copied()
            .unwrap_or_else(|| pattern(block))
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl BlockStore for MemDisk {
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction) {
        match direction {
            Direction::Read => {
                *data = self.contents(block);
                self.reads.fetch_add(1, Ordering::SeqCst);
            }
            Direction::Write => {
                self.written.lock().unwrap().insert(block, *data);
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}
