//! # Memory Layout

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel image is placed in *physical* memory.
///
/// The page allocator manages the range from the end of the image up to
/// [`PHYS_TOP`].
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Amount of RAM above [`PHYS_LOAD`] the kernel assumes to exist.
pub const PHYS_MEM_SIZE: u64 = 128 * 1024 * 1024; // 128 MiB

/// First physical address past the memory managed by the page allocator.
pub const PHYS_TOP: u64 = PHYS_LOAD + PHYS_MEM_SIZE;

/// Granularity of the physical page allocator.
pub const PAGE_SIZE: u64 = 4096;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP > PHYS_LOAD);
    assert!(HHDM_BASE > PHYS_TOP);
};
