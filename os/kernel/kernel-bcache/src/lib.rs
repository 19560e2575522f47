//! # Block Buffer Cache
//!
//! In-memory copies of disk blocks shared by everything above the block
//! device. The cache guarantees that at most one slot holds a given
//! `(device, block)` at a time, so all users of a block see the same bytes,
//! and that only one context at a time works on a block.
//!
//! ## Layout
//!
//! ```text
//!            blockno % NBUCKET
//!                   │
//!   ┌────────┬──────▼─┬────────┬─────┐
//!   │bucket 0│bucket 1│bucket 2│ ... │   one SpinLock each
//!   └───┬────┴───┬────┴────────┴─────┘
//!       │        │  head (coldest) ──▶ tail (most recently released)
//!       ▼        ▼
//!     slots    slots                      one SleepLock + BLOCK_SIZE bytes each
//! ```
//!
//! A lookup only locks its home bucket. When the home bucket has no idle
//! slot, the lookup takes the global steal lock and moves an idle slot over
//! from another bucket.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut buf = cache.read_block(dev, blockno);
//! buf.data_mut()[0] = 42;
//! cache.write_block(&mut buf);
//! cache.release_block(buf);
//! ```
//!
//! Writes go straight to the [`BlockStore`]; there is no write-back.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod block;
mod bucket;
mod cache;
mod slot;

pub use block::{BlockData, BlockId, BlockStore, Direction};
pub use cache::{Buf, BufferCache, CacheStats, SlotRef};
pub use kernel_info::bcache::BLOCK_SIZE;
