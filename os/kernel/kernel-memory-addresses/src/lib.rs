//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and page bases, used by the
//! page allocator to validate the addresses handed to it.
//!
//! | Type | Generic | Description |
//! |------|---------|-------------|
//! | [`PhysicalAddress`] | – | A raw 64-bit physical address. |
//! | [`PhysicalPage<S>`] | [`S: PageSize`](PageSize) | The page-aligned base of a physical page of size `S`. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let base = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x8000_0000));
//! let pa = PhysicalAddress::new(0x8000_3042);
//!
//! assert!(!pa.is_aligned::<Size4K>());
//! assert_eq!(pa.page::<Size4K>().index_from(base), Some(3));
//! assert_eq!(pa.offset::<Size4K>(), 0x42);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`.
//! - Alignment and index calculations are `const fn`.
//! - The phantom marker `S` fixes the page size at the type level.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod physical_page;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_into_page_and_offset() {
        let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
        let page = pa.page::<Size4K>();
        assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
        assert_eq!(pa.offset::<Size4K>(), 0x42);
        assert_eq!(page.base() + pa.offset::<Size4K>(), pa);
    }

    #[test]
    fn alignment_helpers() {
        let a = PhysicalAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.align_up::<Size4K>().map(PhysicalAddress::as_u64), Some(0x13000));
        assert!(!a.is_aligned::<Size4K>());

        let b = PhysicalAddress::new(0x13000);
        assert_eq!(b.align_up::<Size4K>(), Some(b));
        assert!(b.is_aligned::<Size4K>());

        assert_eq!(PhysicalAddress::new(u64::MAX).align_up::<Size4K>(), None);
    }

    #[test]
    fn page_index_relative_to_base() {
        let base = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x8000_0000));
        let page = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x8000_5000));
        assert_eq!(page.index_from(base), Some(5));
        assert_eq!(base.index_from(page), None);
        assert_eq!(base.nth(5), Some(page));
        assert_eq!(base.next(), base.nth(1));
    }

    #[test]
    fn aligned_page_construction() {
        assert!(PhysicalPage::<Size4K>::new_aligned(PhysicalAddress::new(0x1000)).is_some());
        assert!(PhysicalPage::<Size4K>::new_aligned(PhysicalAddress::new(0x1008)).is_none());
    }

    #[test]
    fn distance_between_addresses() {
        let lo = PhysicalAddress::new(0x1000);
        let hi = PhysicalAddress::new(0x4800);
        assert_eq!(hi.checked_offset_from(lo), Some(0x3800));
        assert_eq!(lo.checked_offset_from(hi), None);
    }
}
