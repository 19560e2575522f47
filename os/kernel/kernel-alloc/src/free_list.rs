use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::PhysicalAddress;

/// End of list marker stored in a free page's link word.
const NIL: u64 = u64::MAX;

/// Intrusive LIFO list of free pages.
///
/// A free page's first 8 bytes hold the physical address of the next free page
/// (or [`NIL`]). Nothing but the head and the length lives outside the pages.
pub(crate) struct FreeList {
    head: Option<PhysicalAddress>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Link `page` in at the head.
    ///
    /// # Safety
    /// `page` must be a page-aligned, unused page mapped by `mapper`, and not
    /// already on the list.
    pub(crate) unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, page: PhysicalAddress) {
        // SAFETY: caller hands over an unused page; its first word is ours.
        let link: &mut u64 = unsafe { mapper.phys_to_mut(page) };
        *link = self.head.map_or(NIL, PhysicalAddress::as_u64);
        self.head = Some(page);
        self.len += 1;
    }

    /// Unlink the head page.
    ///
    /// # Safety
    /// Every page on the list must still be mapped by `mapper`.
    pub(crate) unsafe fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<PhysicalAddress> {
        let page = self.head?;
        // SAFETY: pages on the list are unused and hold their link word.
        let link: &mut u64 = unsafe { mapper.phys_to_mut(page) };
        self.head = (*link != NIL).then(|| PhysicalAddress::new(*link));
        self.len -= 1;
        Some(page)
    }
}
