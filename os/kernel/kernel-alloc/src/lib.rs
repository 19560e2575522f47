//! # Physical Page Allocation
//!
//! Whole-page physical memory allocator with per-page reference counts, so a
//! page can be owned by several address spaces at once (copy-on-write).
//!
//! ```text
//! managed range (rounded inward to 4 KiB)
//! ┌────────────────────┬──────────────────────────────────────────┐
//! │ refcount table     │ managed pages                            │
//! │ (u32 per page)     │ free ones linked through their own bytes │
//! └────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! * [`PageAllocator`]: `allocate` / `release` / `increase_refcount`. A page
//!   is on the free list exactly when its count is zero.
//! * [`phys_mapper`]: how the allocator touches physical memory. The kernel
//!   uses [`HhdmPhysMapper`](phys_mapper::HhdmPhysMapper); host tests use an
//!   [`OffsetPhysMapper`](phys_mapper::OffsetPhysMapper) over a heap arena.
//!
//! ## Locking
//!
//! The count table and the free list sit behind two separate
//! [`SpinLock`](kernel_sync::SpinLock)s. They are taken one after the other,
//! never nested, and only meet when a count crosses zero.
//!
//! ## Failure model
//!
//! Running out of pages is recoverable ([`OutOfMemory`]). Handing the
//! allocator an address it does not manage, a misaligned one, or releasing a
//! free page is a kernel bug and panics.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::{PageAllocator, phys_mapper::OffsetPhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! #[repr(C, align(4096))]
//! struct Page([u8; 4096]);
//!
//! let mut arena: Vec<Page> = (0..8).map(|_| Page([0; 4096])).collect();
//! let base = PhysicalAddress::new(0x10_0000);
//! let mapper = OffsetPhysMapper::for_host_region(base, arena.as_mut_ptr().cast());
//! let end = base + 8 * 4096;
//!
//! // SAFETY: the arena outlives the allocator and is used only through it.
//! let alloc = unsafe { PageAllocator::new(mapper, base..end) }.unwrap();
//! let page = alloc.allocate().unwrap();
//! assert_eq!(alloc.refcount(page), 1);
//! assert!(alloc.release(page));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod free_list;
mod page_alloc;
pub mod phys_mapper;
mod refcount;

pub use page_alloc::{InitError, OutOfMemory, PAGE_BYTES, PageAllocator};
