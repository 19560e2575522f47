use crate::block::BlockData;
use core::cell::UnsafeCell;
use core::sync::atomic::AtomicBool;
use kernel_info::bcache::BLOCK_SIZE;
use kernel_sync::SleepLock;

/// One cache slot: a block's bytes and the lock that guards them.
///
/// Identity and reference count live in the slot's [`Entry`](crate::bucket::Entry)
/// so they move with it between buckets.
pub(crate) struct Slot<S> {
    pub(crate) lock: SleepLock<S>,
    /// Whether `data` holds the block's device contents.
    pub(crate) valid: AtomicBool,
    data: UnsafeCell<BlockData>,
}

// SAFETY: `data` is only touched by the holder of `lock`.
unsafe impl<S> Sync for Slot<S> {}

impl<S> Slot<S> {
    pub(crate) const fn new() -> Self {
        Self {
            lock: SleepLock::new("bcache.slot"),
            valid: AtomicBool::new(false),
            data: UnsafeCell::new([0; BLOCK_SIZE]),
        }
    }

    /// # Safety
    /// The caller must hold `lock`, and no `&mut` from
    /// [`data_mut`](Self::data_mut) may be live.
    pub(crate) unsafe fn data(&self) -> &BlockData {
        // SAFETY: no writer while the caller holds the lock without data_mut.
        unsafe { &*self.data.get() }
    }

    /// # Safety
    /// The caller must hold `lock` and must not create any other reference
    /// to the data while this one lives.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn data_mut(&self) -> &mut BlockData {
        // SAFETY: exclusivity is on the caller.
        unsafe { &mut *self.data.get() }
    }
}
