use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical memory page base for size `S`.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0000_0008_1234_5678);
/// let pp = pa.page::<Size4K>();
/// assert_eq!(pp.base().as_u64(), 0x0000_0008_1234_5000);
/// assert_eq!(PhysicalPage::<Size4K>::new_aligned(pa), None);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    base: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// Page that contains `addr` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: PhysicalAddress) -> Self {
        Self {
            base: addr.as_u64() & !(S::SIZE - 1),
            _phantom: PhantomData,
        }
    }

    /// Page starting exactly at `addr`, or `None` if `addr` is unaligned.
    #[inline]
    #[must_use]
    pub const fn new_aligned(addr: PhysicalAddress) -> Option<Self> {
        if addr.is_aligned::<S>() {
            Some(Self::from_addr(addr))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// The page `n` pages above this one, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn nth(self, n: u64) -> Option<Self> {
        let Some(bytes) = n.checked_mul(S::SIZE) else {
            return None;
        };
        match self.base.checked_add(bytes) {
            Some(base) => Some(Self {
                base,
                _phantom: PhantomData,
            }),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        self.nth(1)
    }

    /// Number of pages between `base` and `self`, or `None` if `self < base`.
    #[inline]
    #[must_use]
    pub const fn index_from(self, base: Self) -> Option<usize> {
        match self.base.checked_sub(base.base) {
            Some(bytes) => Some((bytes >> S::SHIFT) as usize),
            None => None,
        }
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalPage<{}>({:#018X})",
            core::any::type_name::<S>(),
            self.base
        )
    }
}
