//! # Physical Memory Mappers
//!
//! Code can only dereference virtual addresses. A [`PhysMapper`] turns a
//! physical address into a reference the running code may use, hiding whether
//! that works through the higher-half direct map (kernel) or a plain offset
//! into a host allocation (tests).
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::{OffsetPhysMapper, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mut word = 0u64;
//! let pa = PhysicalAddress::new(0x2000);
//! let mapper = OffsetPhysMapper::for_host_region(pa, (&raw mut word).cast());
//! unsafe {
//!     *mapper.phys_to_mut::<u64>(pa) = 7;
//! }
//! assert_eq!(word, 7);
//! ```

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Physical address to usable reference.
pub trait PhysMapper {
    /// Map `pa` to a mutable reference of type `T`.
    ///
    /// # Safety
    /// - `pa` must be mapped by this mapper, writable, and aligned for `T`.
    /// - The caller must guarantee exclusive access for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM):
/// physical address `pa` is visible at `HHDM_BASE + pa`.
///
/// # Safety
/// The HHDM mapping must be present and cover every address handed to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (HHDM_BASE + pa.as_u64()) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] that adds a constant (wrapping) offset to every physical
/// address.
#[derive(Debug, Clone, Copy)]
pub struct OffsetPhysMapper {
    offset: u64,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Mapper under which physical `base` lands on `host` (a pointer into the
    /// current address space).
    #[must_use]
    pub fn for_host_region(base: PhysicalAddress, host: *mut u8) -> Self {
        Self::new((host as u64).wrapping_sub(base.as_u64()))
    }

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for OffsetPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_u64().wrapping_add(self.offset) as *mut T;
        // SAFETY: Caller guarantees `pa` lies in the region this offset maps.
        unsafe { &mut *va }
    }
}
