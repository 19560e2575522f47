use crate::block::{BlockData, BlockId, BlockStore, Direction};
use crate::bucket::{Bucket, Entry};
use crate::slot::Slot;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_info::bcache;
use kernel_sync::{Scheduler, SpinLock};
use log::{debug, error, trace};

/// Counters since the cache was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found their block resident.
    pub hits: u64,
    /// Lookups that had to repurpose a slot.
    pub misses: u64,
    /// Misses served by a slot taken from another bucket.
    pub steals: u64,
    pub device_reads: u64,
    pub device_writes: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    steals: AtomicU64,
    device_reads: AtomicU64,
    device_writes: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            device_reads: self.device_reads.load(Ordering::Relaxed),
            device_writes: self.device_writes.load(Ordering::Relaxed),
        }
    }
}

/// How a lookup got its slot.
enum Claim {
    /// The block was resident; the slot lock still has to be taken.
    Hit(usize),
    /// An idle slot now carries the block; its lock is already held.
    Recycled(usize),
}

/// Sharded cache of `NBUF` block slots over a [`BlockStore`].
///
/// Slots are spread over `NBUCKET` buckets by `blockno % NBUCKET`; each
/// bucket has its own spin lock. Each slot has a [`SleepLock`] held by
/// whoever has the block checked out, across device I/O.
///
/// Lock order: a home bucket alone, or the steal lock, then the home bucket,
/// then one other bucket at a time.
///
/// [`SleepLock`]: kernel_sync::SleepLock
pub struct BufferCache<
    D,
    S,
    const NBUF: usize = { bcache::NBUF },
    const NBUCKET: usize = { bcache::NBUCKET },
> {
    store: D,
    slots: [Slot<S>; NBUF],
    buckets: [SpinLock<Bucket<NBUF>>; NBUCKET],
    steal_lock: SpinLock<()>,
    stats: Counters,
}

impl<D, S, const NBUF: usize, const NBUCKET: usize> BufferCache<D, S, NBUF, NBUCKET> {
    const GEOMETRY: () = assert!(NBUF > 0 && NBUCKET > 0, "bcache: empty geometry");

    /// Cache over `store` with every slot idle and without identity.
    ///
    /// Slot `i` starts in bucket `i % NBUCKET`.
    #[must_use]
    pub fn new(store: D) -> Self {
        let () = Self::GEOMETRY;

        let mut buckets: [SpinLock<Bucket<NBUF>>; NBUCKET] =
            core::array::from_fn(|_| SpinLock::named("bcache.bucket", Bucket::new()));
        for slot in 0..NBUF {
            buckets[slot % NBUCKET].get_mut().push_back(Entry::unused(slot));
        }
        debug!("bcache: {NBUF} slots in {NBUCKET} buckets");

        Self {
            store,
            slots: core::array::from_fn(|_| Slot::new()),
            buckets,
            steal_lock: SpinLock::named("bcache.steal", ()),
            stats: Counters::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Reference count of the slot holding `block`, or `None` if the block is
    /// not resident.
    #[must_use]
    pub fn refcount(&self, block: BlockId) -> Option<u32> {
        let bucket = self.buckets[Self::home(block)].lock();
        bucket.find(block).map(|pos| bucket.entries()[pos].refcnt)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn home(block: BlockId) -> usize {
        block.blockno as usize % NBUCKET
    }
}

impl<D, S, const NBUF: usize, const NBUCKET: usize> BufferCache<D, S, NBUF, NBUCKET>
where
    D: BlockStore,
    S: Scheduler,
{
    /// Check out the slot for `(dev, blockno)` and lock it.
    ///
    /// The contents are whatever the slot holds; see [`read_block`] for a
    /// loaded buffer. Blocks while another context has the block checked out.
    ///
    /// # Panics
    /// If every slot is in use.
    ///
    /// [`read_block`]: Self::read_block
    pub fn acquire_block(&self, dev: u32, blockno: u32) -> Buf<'_, S> {
        let block = BlockId::new(dev, blockno);
        let home = Self::home(block);

        let claim = {
            let mut bucket = self.buckets[home].lock();
            self.claim(&mut bucket, block)
        };

        let index = match claim.or_else(|| self.steal(block, home)) {
            Some(Claim::Hit(index)) => {
                Counters::bump(&self.stats.hits);
                self.slots[index].lock.acquire();
                index
            }
            Some(Claim::Recycled(index)) => {
                Counters::bump(&self.stats.misses);
                index
            }
            None => fatal(format_args!("acquire_block: no free cache slots for {block}")),
        };

        Buf {
            slot: &self.slots[index],
            index,
            block,
        }
    }

    /// Check out `(dev, blockno)` with its device contents loaded.
    ///
    /// # Panics
    /// As [`acquire_block`](Self::acquire_block).
    pub fn read_block(&self, dev: u32, blockno: u32) -> Buf<'_, S> {
        let mut buf = self.acquire_block(dev, blockno);
        if !buf.slot.valid.load(Ordering::Acquire) {
            self.store
                .transfer(buf.block, buf.data_mut(), Direction::Read);
            Counters::bump(&self.stats.device_reads);
            buf.slot.valid.store(true, Ordering::Release);
        }
        buf
    }

    /// Write the buffer's contents through to the device.
    ///
    /// # Panics
    /// If the calling context does not hold the buffer's lock.
    pub fn write_block(&self, buf: &mut Buf<'_, S>) {
        self.check_owner(buf, "write_block");
        self.store
            .transfer(buf.block, buf.data_mut(), Direction::Write);
        Counters::bump(&self.stats.device_writes);
    }

    /// Check a buffer back in.
    ///
    /// Unlocks the slot; once nobody else holds or pins it, it becomes the
    /// hottest entry of its bucket.
    ///
    /// # Panics
    /// If the calling context does not hold the buffer's lock.
    pub fn release_block(&self, buf: Buf<'_, S>) {
        self.check_owner(&buf, "release_block");
        buf.slot.lock.release();

        let mut bucket = self.buckets[Self::home(buf.block)].lock();
        let pos = Self::resident(&bucket, buf.slot(), "release_block");
        let entry = bucket.get_mut(pos);
        entry.refcnt -= 1;
        if entry.refcnt == 0 {
            bucket.move_to_back(pos);
        }
    }

    /// Keep a slot resident without holding its lock.
    ///
    /// # Panics
    /// If the slot no longer holds the block it was checked out for.
    pub fn pin(&self, slot: SlotRef) {
        let mut bucket = self.buckets[Self::home(slot.block)].lock();
        let pos = Self::resident(&bucket, slot, "pin");
        bucket.get_mut(pos).refcnt += 1;
    }

    /// Undo one [`pin`](Self::pin). The slot keeps its place in the bucket.
    ///
    /// # Panics
    /// If the slot no longer holds its block or its count is already zero.
    pub fn unpin(&self, slot: SlotRef) {
        let mut bucket = self.buckets[Self::home(slot.block)].lock();
        let pos = Self::resident(&bucket, slot, "unpin");
        let entry = bucket.get_mut(pos);
        match entry.refcnt.checked_sub(1) {
            Some(refcnt) => entry.refcnt = refcnt,
            None => fatal(format_args!("unpin: {} is not referenced", slot.block)),
        }
    }

    /// Find `block` in `bucket`, or repurpose the bucket's coldest idle slot.
    fn claim(&self, bucket: &mut Bucket<NBUF>, block: BlockId) -> Option<Claim> {
        if let Some(pos) = bucket.find(block) {
            let entry = bucket.get_mut(pos);
            entry.refcnt += 1;
            return Some(Claim::Hit(entry.slot));
        }

        let pos = bucket.first_free()?;
        let entry = bucket.get_mut(pos);
        self.repurpose(entry, block);
        Some(Claim::Recycled(entry.slot))
    }

    /// Miss with no idle slot at home: move one in from another bucket.
    fn steal(&self, block: BlockId, home: usize) -> Option<Claim> {
        let _steal = self.steal_lock.lock();
        let mut bucket = self.buckets[home].lock();

        // Another context may have brought the block in or freed a slot
        // since the home bucket was unlocked.
        if let Some(claim) = self.claim(&mut bucket, block) {
            return Some(claim);
        }

        for victim in (0..NBUCKET).filter(|&b| b != home) {
            let mut other = self.buckets[victim].lock();
            let Some(pos) = other.first_free() else {
                continue;
            };
            let mut entry = other.remove(pos);
            drop(other);

            self.repurpose(&mut entry, block);
            bucket.push_back(entry);
            Counters::bump(&self.stats.steals);
            trace!(
                "acquire_block: {block} took slot {} from bucket {victim} to {home}",
                entry.slot
            );
            return Some(Claim::Recycled(entry.slot));
        }
        None
    }

    /// Give an idle entry a new identity and lock its slot.
    fn repurpose(&self, entry: &mut Entry, block: BlockId) {
        let slot = &self.slots[entry.slot];
        entry.block = Some(block);
        entry.refcnt = 1;
        slot.valid.store(false, Ordering::Release);
        // Idle means unlocked with no waiters, so this does not block.
        slot.lock.acquire();
    }

    fn check_owner(&self, buf: &Buf<'_, S>, op: &str) {
        let ours = self
            .slots
            .get(buf.index)
            .is_some_and(|slot| core::ptr::eq(slot, buf.slot));
        if !ours {
            fatal(format_args!("{op}: buffer for {} is from another cache", buf.block));
        }
        if !buf.slot.lock.holding() {
            fatal(format_args!("{op}: {} is not locked by the caller", buf.block));
        }
    }

    /// Position of `slot`'s entry in its home bucket.
    fn resident(bucket: &Bucket<NBUF>, slot: SlotRef, op: &str) -> usize {
        match bucket.position_of_slot(slot.index) {
            Some(pos) if bucket.entries()[pos].block == Some(slot.block) => pos,
            _ => fatal(format_args!("{op}: slot {} no longer holds {}", slot.index, slot.block)),
        }
    }
}

impl<D, S, const NBUF: usize, const NBUCKET: usize> fmt::Debug
    for BufferCache<D, S, NBUF, NBUCKET>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferCache")
            .field("slots", &NBUF)
            .field("buckets", &NBUCKET)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// A checked-out block. Must be handed back with
/// [`BufferCache::release_block`].
#[must_use = "a checked-out block stays locked until passed to release_block"]
pub struct Buf<'a, S> {
    slot: &'a Slot<S>,
    index: usize,
    block: BlockId,
}

impl<S> Buf<'_, S> {
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    #[must_use]
    pub fn data(&self) -> &BlockData {
        // SAFETY: a Buf exists only while its slot lock is held, and it is
        // the only handle to the data.
        unsafe { self.slot.data() }
    }

    pub fn data_mut(&mut self) -> &mut BlockData {
        // SAFETY: as in `data`; `&mut self` makes this borrow unique.
        unsafe { self.slot.data_mut() }
    }

    /// Handle for [`BufferCache::pin`] and [`BufferCache::unpin`] that
    /// outlives the checkout.
    #[must_use]
    pub const fn slot(&self) -> SlotRef {
        SlotRef {
            index: self.index,
            block: self.block,
        }
    }
}

impl<S> fmt::Debug for Buf<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("block", &self.block)
            .field("slot", &self.index)
            .finish_non_exhaustive()
    }
}

/// A slot together with the block it held when the reference was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    index: usize,
    block: BlockId,
}

impl SlotRef {
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }
}

/// Log and panic on a broken cache contract.
#[cold]
#[track_caller]
fn fatal(args: fmt::Arguments<'_>) -> ! {
    error!("{args}");
    panic!("{args}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_sync::HostScheduler;

    struct NullStore;

    impl BlockStore for NullStore {
        fn transfer(&self, _: BlockId, _: &mut BlockData, _: Direction) {}
    }

    type Cache<const NBUF: usize, const NBUCKET: usize> =
        BufferCache<NullStore, HostScheduler, NBUF, NBUCKET>;

    fn slots_of<const NBUF: usize, const NBUCKET: usize>(
        cache: &Cache<NBUF, NBUCKET>,
        bucket: usize,
    ) -> Vec<usize> {
        cache.buckets[bucket]
            .lock()
            .entries()
            .iter()
            .map(|e| e.slot)
            .collect()
    }

    #[test]
    fn slots_start_round_robin() {
        let cache = Cache::<7, 3>::new(NullStore);
        assert_eq!(slots_of(&cache, 0), [0, 3, 6]);
        assert_eq!(slots_of(&cache, 1), [1, 4]);
        assert_eq!(slots_of(&cache, 2), [2, 5]);
    }

    #[test]
    fn miss_reuses_coldest_idle_slot() {
        let cache = Cache::<4, 1>::new(NullStore);
        for blockno in 0..4 {
            let buf = cache.acquire_block(1, blockno);
            cache.release_block(buf);
        }
        // Released in order 0..4, so slot 0 (block 0) is now coldest again.
        assert_eq!(slots_of(&cache, 0), [0, 1, 2, 3]);

        let buf = cache.acquire_block(1, 9);
        assert_eq!(buf.slot().index, 0);
        cache.release_block(buf);
        assert_eq!(slots_of(&cache, 0), [1, 2, 3, 0]);
        assert_eq!(cache.refcount(BlockId::new(1, 0)), None);
    }

    #[test]
    fn stolen_slot_joins_home_tail() {
        let cache = Cache::<4, 2>::new(NullStore);
        // Bucket 0 holds slots 0 and 2; fill both with even blocks.
        let a = cache.acquire_block(1, 0);
        let b = cache.acquire_block(1, 2);
        let c = cache.acquire_block(1, 4);

        assert_eq!(slots_of(&cache, 0), [0, 2, 1]);
        assert_eq!(slots_of(&cache, 1), [3]);
        assert_eq!(cache.stats().steals, 1);

        for buf in [a, b, c] {
            cache.release_block(buf);
        }
    }

    #[test]
    fn unpin_does_not_reorder() {
        let cache = Cache::<3, 1>::new(NullStore);
        let buf = cache.acquire_block(1, 0);
        let slot = buf.slot();
        cache.pin(slot);
        cache.release_block(buf);
        let other = cache.acquire_block(1, 1);
        cache.release_block(other);

        // Slot 0 stayed referenced, so the miss took slot 1.
        assert_eq!(slots_of(&cache, 0), [0, 2, 1]);
        cache.unpin(slot);
        assert_eq!(slots_of(&cache, 0), [0, 2, 1]);
        assert_eq!(cache.refcount(BlockId::new(1, 0)), Some(0));
    }
}
