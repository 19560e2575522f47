//! # Block Cache Geometry

/// Size of one disk block in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Maximum number of blocks any single filesystem operation writes.
pub const MAX_OP_BLOCKS: usize = 10;

/// Number of cache slots in the pool.
pub const NBUF: usize = MAX_OP_BLOCKS * 3;

/// Number of independently locked buckets the pool is hashed into.
///
/// Prime, so consecutive block numbers spread evenly.
pub const NBUCKET: usize = 13;

const _: () = {
    assert!(BLOCK_SIZE.is_power_of_two());
    assert!(NBUCKET > 0);
    assert!(NBUF >= NBUCKET);
};
