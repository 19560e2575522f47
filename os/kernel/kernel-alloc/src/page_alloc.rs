use crate::free_list::FreeList;
use crate::phys_mapper::{HhdmPhysMapper, PhysMapper};
use crate::refcount::RefcountTable;
use core::fmt;
use core::ops::Range;
use kernel_info::memory::{PAGE_SIZE, PHYS_LOAD, PHYS_TOP};
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinLock;
use log::{debug, error, trace, warn};

/// Bytes per managed page.
#[allow(clippy::cast_possible_truncation)]
pub const PAGE_BYTES: usize = Size4K::SIZE as usize;

const _: () = assert!(PAGE_SIZE == Size4K::SIZE);

/// Junk written over a page handed out by [`PageAllocator::allocate`].
const ALLOC_FILL: u8 = 0x05;
/// Junk written over a page returned to the free list.
const FREE_FILL: u8 = 0x01;

type PageFrame = [u8; PAGE_BYTES];

/// The free list is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("out of physical pages")]
pub struct OutOfMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("invalid physical range {start}..{end}")]
    InvalidRange {
        start: PhysicalAddress,
        end: PhysicalAddress,
    },
    #[error("range of {pages} pages cannot hold the refcount table and one page")]
    RangeTooSmall { pages: u64 },
}

/// Reference-counted allocator of 4 KiB physical pages.
///
/// Every managed page has a count: zero while on the free list, one after
/// [`allocate`](Self::allocate), more once shared through
/// [`increase_refcount`](Self::increase_refcount). [`release`](Self::release)
/// drops one reference and frees the page when the last one goes.
pub struct PageAllocator<M: PhysMapper> {
    mapper: M,
    /// First page handed out; the refcount table sits below it.
    first: PhysicalPage<Size4K>,
    pages: usize,
    counts: SpinLock<RefcountTable>,
    free: SpinLock<FreeList>,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// Take over `range` and put every page in it on the free list.
    ///
    /// The range is rounded inward to page boundaries. Its first pages hold
    /// the refcount table; the rest are managed. Pages are released in
    /// ascending order, so the highest one is handed out first.
    ///
    /// # Errors
    /// [`InitError`] if `range` is inverted or too small for the table plus
    /// one page.
    ///
    /// # Safety
    /// - `mapper` must map all of `range` writable for the allocator's life.
    /// - Nothing else may use `range` while the allocator exists, except pages
    ///   the allocator has handed out.
    pub unsafe fn new(mapper: M, range: Range<PhysicalAddress>) -> Result<Self, InitError> {
        let Range { start, end } = range;
        let invalid = InitError::InvalidRange { start, end };
        if end < start {
            return Err(invalid);
        }

        let base = start.align_up::<Size4K>().ok_or(invalid)?;
        let total = end
            .align_down::<Size4K>()
            .checked_offset_from(base)
            .unwrap_or(0)
            / Size4K::SIZE;
        let table_pages = (total * size_of::<u32>() as u64).div_ceil(Size4K::SIZE);
        if total <= table_pages {
            return Err(InitError::RangeTooSmall { pages: total });
        }
        let pages = usize::try_from(total - table_pages).map_err(|_| invalid)?;
        let first = base.page::<Size4K>().nth(table_pages).ok_or(invalid)?;

        // SAFETY: the table pages are inside `range`, which the caller hands
        // over for good; `base` is page aligned and so aligned for u32.
        let table = unsafe {
            let head: &mut u32 = mapper.phys_to_mut(base);
            core::slice::from_raw_parts_mut(core::ptr::from_mut(head), pages)
        };
        let mut counts = RefcountTable::new(table);
        counts.fill(1);

        let allocator = Self {
            mapper,
            first,
            pages,
            counts: SpinLock::named("kmem.refcount", counts),
            free: SpinLock::named("kmem.freelist", FreeList::new()),
        };
        debug!(
            "page allocator: {pages} pages at {}, {table_pages} table pages at {base}",
            first.base()
        );

        for index in 0..pages {
            allocator.release(allocator.page_at(index));
        }
        Ok(allocator)
    }

    /// Hand out a free page with count 1, filled with junk.
    ///
    /// # Errors
    /// [`OutOfMemory`] if no page is free.
    pub fn allocate(&self) -> Result<PhysicalAddress, OutOfMemory> {
        // SAFETY: listed pages are managed, hence mapped.
        let Some(page) = self.free.with_lock(|free| unsafe { free.pop(&self.mapper) }) else {
            warn!("allocate: out of memory, all {} pages in use", self.pages);
            return Err(OutOfMemory);
        };

        // SAFETY: the page just left the free list; nobody else references it.
        unsafe { self.frame(page) }.fill(ALLOC_FILL);
        let index = self.index_of(page, "allocate");
        self.counts.lock().set(index, 1);
        trace!("allocate: {page}");
        Ok(page)
    }

    /// Drop one reference to `page`; returns `true` if that freed it.
    ///
    /// # Panics
    /// If `page` is misaligned, not managed here, or already free.
    pub fn release(&self, page: PhysicalAddress) -> bool {
        let index = self.index_of(page, "release");
        let remaining = self.counts.lock().decrement(index);
        match remaining {
            None => fatal(format_args!("release: page {page} is already free")),
            Some(0) => {
                // SAFETY: the last reference is gone; the page is ours again.
                unsafe { self.frame(page) }.fill(FREE_FILL);
                // SAFETY: a count that just hit zero means the page is not listed.
                self.free
                    .with_lock(|free| unsafe { free.push(&self.mapper, page) });
                trace!("release: {page} freed");
                true
            }
            Some(_) => false,
        }
    }

    /// Add an owner to an allocated `page`; returns the new count.
    ///
    /// # Panics
    /// If `page` is misaligned, not managed here, or free.
    pub fn increase_refcount(&self, page: PhysicalAddress) -> u32 {
        let index = self.index_of(page, "increase_refcount");
        let mut counts = self.counts.lock();
        if counts.get(index) == 0 {
            drop(counts);
            fatal(format_args!("increase_refcount: page {page} is free"));
        }
        counts.increment(index)
    }

    /// Give the caller a page it owns alone, with the contents of `page`.
    ///
    /// Returns `page` itself when the caller is its only owner. Otherwise
    /// copies it into a fresh page and drops the caller's reference to the
    /// original.
    ///
    /// # Errors
    /// [`OutOfMemory`] if a copy is needed and no page is free; `page` keeps
    /// the caller's reference.
    ///
    /// # Panics
    /// As [`release`](Self::release).
    pub fn unshare(&self, page: PhysicalAddress) -> Result<PhysicalAddress, OutOfMemory> {
        if self.refcount(page) == 1 {
            return Ok(page);
        }
        let copy = self.allocate()?;
        // SAFETY: `copy` is fresh; `page` is kept alive by our reference.
        unsafe { self.frame(copy).copy_from_slice(self.frame(page)) };
        self.release(page);
        trace!("unshare: {page} copied to {copy}");
        Ok(copy)
    }

    /// Current count of `page`.
    ///
    /// # Panics
    /// If `page` is misaligned or not managed here.
    #[must_use]
    pub fn refcount(&self, page: PhysicalAddress) -> u32 {
        let index = self.index_of(page, "refcount");
        self.counts.lock().get(index)
    }

    #[must_use]
    pub fn free_pages(&self) -> usize {
        self.free.lock().len()
    }

    #[must_use]
    pub const fn managed_pages(&self) -> usize {
        self.pages
    }

    /// Addresses of the pages this allocator hands out.
    #[must_use]
    pub fn managed_range(&self) -> Range<PhysicalAddress> {
        let start = self.first.base();
        start..start + self.pages as u64 * Size4K::SIZE
    }

    fn page_at(&self, index: usize) -> PhysicalAddress {
        self.first.base() + index as u64 * Size4K::SIZE
    }

    #[track_caller]
    fn index_of(&self, page: PhysicalAddress, op: &str) -> usize {
        if !page.is_aligned::<Size4K>() {
            fatal(format_args!("{op}: misaligned page {page}"));
        }
        match page.page::<Size4K>().index_from(self.first) {
            Some(index) if index < self.pages => index,
            _ => fatal(format_args!("{op}: page {page} outside managed range")),
        }
    }

    /// # Safety
    /// `page` must be managed and the caller must have exclusive use of it.
    #[allow(clippy::mut_from_ref)]
    unsafe fn frame(&self, page: PhysicalAddress) -> &mut PageFrame {
        // SAFETY: managed pages are mapped; exclusivity is on the caller.
        unsafe { self.mapper.phys_to_mut(page) }
    }
}

impl PageAllocator<HhdmPhysMapper> {
    /// Allocator over the RAM between the end of the kernel image and
    /// [`PHYS_TOP`], reached through the direct map.
    ///
    /// # Errors
    /// [`InitError::InvalidRange`] if `kernel_end` lies outside
    /// [`PHYS_LOAD`]..[`PHYS_TOP`]; otherwise as [`new`](Self::new).
    ///
    /// # Safety
    /// The direct map must cover `kernel_end..PHYS_TOP`, and nothing but the
    /// allocator may use that memory.
    pub unsafe fn for_kernel(kernel_end: PhysicalAddress) -> Result<Self, InitError> {
        let top = PhysicalAddress::new(PHYS_TOP);
        if kernel_end < PhysicalAddress::new(PHYS_LOAD) {
            return Err(InitError::InvalidRange {
                start: kernel_end,
                end: top,
            });
        }
        // SAFETY: forwarded to the caller.
        unsafe { Self::new(HhdmPhysMapper, kernel_end..top) }
    }
}

impl<M: PhysMapper> fmt::Debug for PageAllocator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAllocator")
            .field("managed", &self.managed_range())
            .field("free_pages", &self.free_pages())
            .finish_non_exhaustive()
    }
}

/// Log and panic on a broken allocator contract.
#[cold]
#[track_caller]
fn fatal(args: fmt::Arguments<'_>) -> ! {
    error!("{args}");
    panic!("{args}");
}
