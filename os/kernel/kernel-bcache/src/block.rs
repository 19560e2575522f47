use core::fmt;
use kernel_info::bcache::BLOCK_SIZE;

/// Contents of one disk block.
pub type BlockData = [u8; BLOCK_SIZE];

/// Identity of a disk block: device number and block number on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub dev: u32,
    pub blockno: u32,
}

impl BlockId {
    #[must_use]
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.blockno)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to memory.
    Read,
    /// Memory to device.
    Write,
}

/// Raw block device underneath the cache.
///
/// Transfers are synchronous: `transfer` returns once the block has been
/// read into `data` or written from it. The store is the authority on block
/// contents.
pub trait BlockStore {
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction);
}

impl<T: BlockStore + ?Sized> BlockStore for &T {
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction) {
        (**self).transfer(block, data, direction);
    }
}
