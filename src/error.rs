//! Error types surfaced by the allocator.
//!
//! There are only two ways this crate fails (see the crate-level docs):
//! the byte-region provider refuses to grow ([`OutOfMemory`]), or the caller
//! violates the contract of `free`/`realloc` (a non-heap pointer, a
//! double-free), which is undefined behavior and therefore not represented
//! as a typed error at all — see the `# Safety` sections on those methods.

/// The byte-region provider refused to grow the heap.
///
/// Returned by [`ByteRegionProvider::region_grow`](crate::ByteRegionProvider::region_grow)
/// and by [`RawAllocator::init`](crate::raw_allocator::RawAllocator::init). A
/// failing growth call leaves the heap exactly as it was: this error carries
/// no partial-failure state to clean up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;
