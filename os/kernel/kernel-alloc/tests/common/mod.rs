#![allow(dead_code)]

use kernel_alloc::{PAGE_BYTES, PageAllocator, phys_mapper::OffsetPhysMapper};
use kernel_memory_addresses::PhysicalAddress;

/// Physical address the test arenas pretend to live at.
pub const ARENA_BASE: PhysicalAddress = PhysicalAddress::new(0x0010_0000);

#[repr(C, align(4096))]
pub struct Page(pub [u8; PAGE_BYTES]);

/// Host memory standing in for a physical range starting at [`ARENA_BASE`].
pub struct Arena {
    pages: Vec<Page>,
}

impl Arena {
    pub fn new(pages: usize) -> Self {
        Self {
            pages: (0..pages).map(|_| Page([0; PAGE_BYTES])).collect(),
        }
    }

    pub fn mapper(&mut self) -> OffsetPhysMapper {
        OffsetPhysMapper::for_host_region(ARENA_BASE, self.pages.as_mut_ptr().cast())
    }

    pub fn end(&self) -> PhysicalAddress {
        ARENA_BASE + (self.pages.len() * PAGE_BYTES) as u64
    }

    /// Allocator over the whole arena. The arena must outlive it.
    pub fn allocator(&mut self) -> PageAllocator<OffsetPhysMapper> {
        let mapper = self.mapper();
        // SAFETY: the arena is heap memory owned by the test and only touched
        // through the allocator.
        unsafe { PageAllocator::new(mapper, ARENA_BASE..self.end()) }.expect("arena is large enough")
    }

    /// Host view of a physical page in the arena.
    pub fn page(&self, pa: PhysicalAddress) -> &[u8; PAGE_BYTES] {
        let index = (pa.as_u64() - ARENA_BASE.as_u64()) as usize / PAGE_BYTES;
        &self.pages[index].0
    }

    pub fn page_mut(&mut self, pa: PhysicalAddress) -> &mut [u8; PAGE_BYTES] {
        let index = (pa.as_u64() - ARENA_BASE.as_u64()) as usize / PAGE_BYTES;
        &mut self.pages[index].0
    }
}
