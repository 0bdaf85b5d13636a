//! The allocator's tuned, compile-time constants.
//!
//! Everything here is a fixed tuning knob, not a per-instantiation
//! parameter: the reference implementation hard-codes these values, and the
//! spec's design notes call the `44` and the smoothing window "tuning
//! constants, not semantic thresholds" — so they live as plain `const`s
//! rather than `RawAllocator` const generics.

use core::mem;

use super::header::BlockHeader;

/// Size of one block header: a `u32` size/alloc-bit field plus a `u32`
/// previous-block-size field.
pub(crate) const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Smallest legal block size: header + two free-list link pointers.
pub(crate) const MIN_BLOCK_SIZE: usize = 24;

/// Number of segregated free-list buckets.
pub(crate) const NUM_BUCKETS: usize = 47;

/// Bytes occupied by the directory (one 8-byte head-pointer slot per bucket).
pub(crate) const DIRECTORY_SLOT_BYTES: usize = 8;
pub(crate) const DIRECTORY_BYTES: usize = NUM_BUCKETS * DIRECTORY_SLOT_BYTES;

/// Geometric/arithmetic seam in the bucket classifier.
pub(crate) const LARGE_THRESHOLD: u32 = 1024;
/// Arithmetic stride of the buckets above [`LARGE_THRESHOLD`].
pub(crate) const LARGE_STEP: u32 = 800;
/// Rounding bias so arithmetic-band edges land on 1025, 1825, 2625, ...
pub(crate) const LARGE_STEP_BIAS: u32 = 575;
/// First bucket index produced by the arithmetic branch of `classify`.
pub(crate) const LARGE_BUCKET_BASE: u32 = 4;

/// `find_fit`'s heuristic: at or above this bucket index, scan top-down
/// from the overflow bucket instead of walking the bucket's own list.
/// A tuned constant (spec §4.5, §9), not a hard boundary of the classifier.
pub(crate) const LARGE_BUCKET_FLOOR: usize = 44;

/// Bytes requested from the byte-region provider for the initial heap.
pub(crate) const CHUNKSIZE: usize = 58176;
/// Bytes requested from the byte-region provider on a `find_fit` miss.
pub(crate) const EXTEND_SIZE: usize = 4400 * 8;

/// `malloc`'s size-smoothing window: requests strictly between these two
/// bounds are candidates for promotion to the next power of two.
pub(crate) const SMOOTH_MIN: usize = 100;
pub(crate) const SMOOTH_MAX: usize = 500;
