//! # Kernel Configuration
//!
//! Compile-time constants shared by the kernel's resource managers. This crate
//! is the single source of truth for the physical memory layout handed to the
//! page allocator and for the geometry of the block cache.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! * **Direct Map**: [`HHDM_BASE`](memory::HHDM_BASE), the offset at which all
//!   physical memory is visible to the kernel
//! * **Managed RAM**: [`PHYS_LOAD`](memory::PHYS_LOAD) and
//!   [`PHYS_TOP`](memory::PHYS_TOP), the bounds of the physical range the page
//!   allocator may hand out once the kernel image is subtracted
//!
//! ### Block Cache ([`bcache`])
//! * **Block Size**: [`BLOCK_SIZE`](bcache::BLOCK_SIZE), fixed system-wide
//! * **Pool Geometry**: [`NBUF`](bcache::NBUF) slots hashed into
//!   [`NBUCKET`](bcache::NBUCKET) buckets
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//! end         ├─────────────────────────────────┤
//!             │   Reference-count table         │
//!             ├─────────────────────────────────┤
//!             │   Pages (free list / in use)    │
//! PHYS_TOP    └─────────────────────────────────┘ 0x0810_0000 (129 MiB)
//! ```
//!
//! All values are `const` and validated with compile-time assertions, so an
//! inconsistent configuration fails the build instead of the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod bcache;
pub mod memory;
