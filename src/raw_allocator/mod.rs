//! This module provides the raw allocator and its support types.
//!
//! A "raw allocator" is one that simply gets requests for a specific memory
//! size but does not need to worry about alignment: that is
//! [`super::Allocator`]'s job, sitting on top of this one as a
//! [`core::alloc::GlobalAlloc`].
//!
//! Internally this is a segregated-fit allocator: [`bucket`] classifies a
//! block size into one of [`tunables::NUM_BUCKETS`] free-list buckets,
//! [`heap`] owns the in-band headers and the directory of bucket heads,
//! [`freelist`] maintains each bucket's doubly-linked LIFO list, and
//! [`engine`] ties them together into `find_fit`/`place`/`coalesce`/
//! `extend_heap` and the public `malloc`/`free`/`realloc`.
mod bucket;
// Needed whenever something might call `engine`'s debug-build self-check
// (`cfg(debug_assertions)`, always on for dev/test profiles) or when the
// `tests/` integration crate reaches in via `Allocator::assert_consistent`
// (`internal-checker`), in addition to this module's own unit tests.
#[cfg(any(test, debug_assertions, feature = "internal-checker"))]
mod checker;
mod engine;
mod freelist;
mod header;
mod heap;
mod tunables;

use core::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::region::ByteRegionProvider;

use heap::Heap;

/// A raw memory allocator for contiguous byte regions, without any
/// alignment handling: the allocated memory is always 8-byte aligned (the
/// [`BlockHeader`](header::BlockHeader) size), which is as much as this
/// layer promises.
///
/// The heap image itself lives entirely inside memory obtained from `P`; a
/// `RawAllocator` holds nothing but the bookkeeping needed to navigate it.
pub(crate) struct RawAllocator<P: ByteRegionProvider> {
    heap: Heap<P>,
}

impl<P: ByteRegionProvider> RawAllocator<P> {
    /// Request the initial heap image from `provider` and set up the
    /// segregated free-list directory.
    pub(crate) fn init(provider: P) -> Result<Self, OutOfMemory> {
        Ok(Self {
            heap: Heap::init(provider)?,
        })
    }

    /// Allocate a block able to hold at least `size` bytes, returning a
    /// pointer to its payload, or `None` if the heap could not be grown far
    /// enough to satisfy the request.
    pub(crate) fn malloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: `self.heap` is always well-formed between calls.
        unsafe { engine::malloc(&mut self.heap, size) }.ok()
    }

    /// Return `ptr`'s block to the free lists.
    ///
    /// # Safety
    /// `ptr` must have come from [`Self::malloc`] or [`Self::realloc`] on
    /// this allocator and must not already have been freed.
    pub(crate) unsafe fn free(&mut self, ptr: NonNull<u8>) {
        unsafe { engine::free(&mut self.heap, ptr) };
    }

    /// Resize `ptr`'s allocation to `new_size` bytes. See [`engine::realloc`]
    /// for the documented copy-semantics quirk this preserves.
    ///
    /// # Panics
    /// Panics if the heap cannot grow enough to satisfy the request.
    ///
    /// # Safety
    /// `ptr` must have come from [`Self::malloc`] or [`Self::realloc`] on
    /// this allocator and must not already have been freed.
    pub(crate) unsafe fn realloc(&mut self, ptr: NonNull<u8>, new_size: usize) -> NonNull<u8> {
        unsafe { engine::realloc(&mut self.heap, ptr, new_size) }
    }

    /// A read-only snapshot of the heap's size and how much of it is free,
    /// for debugging and tests. Not part of the allocator's normal
    /// operation — see `DESIGN.md`.
    #[cfg(any(test, feature = "internal-stats"))]
    pub(crate) fn stats(&self) -> Stats {
        Stats {
            heap_bytes: self.heap.heap_bytes(),
            free_bytes: self.heap.free_bytes(),
            free_num: self.heap.free_num,
        }
    }

    /// Walk the heap and the directory, panicking if any of invariants
    /// I1–I8 (§3) don't hold. See [`checker::assert_consistent`].
    #[cfg(any(test, debug_assertions, feature = "internal-checker"))]
    pub(crate) fn assert_consistent(&self) {
        checker::assert_consistent(&self.heap);
    }
}

/// See [`RawAllocator::stats`].
#[cfg(any(test, feature = "internal-stats"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Total bytes spanned by the heap, prologue and epilogue included.
    pub heap_bytes: usize,
    /// Total bytes currently linked into some bucket's free list (a
    /// reflection of invariant I8: this equals the sum of every free
    /// block's `block_size`, summed directly from the directory).
    pub free_bytes: usize,
    /// Number of blocks currently linked into some bucket's free list.
    pub free_num: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::test_support::FixedRegion;

    const SMALL_HEAP: usize = 1 << 17;
    const HUGE_HEAP: usize = 1 << 21;

    fn allocator() -> RawAllocator<FixedRegion<SMALL_HEAP>> {
        RawAllocator::init(FixedRegion::new()).unwrap()
    }

    #[test]
    fn single_allocation_round_trips() {
        let mut allocator = allocator();
        let ptr = allocator.malloc(64).unwrap();
        unsafe {
            ptr.as_ptr().write_bytes(0xAB, 64);
            allocator.free(ptr);
        }
        checker::assert_consistent(&allocator.heap);
    }

    #[test]
    fn many_small_allocations_stay_distinct() {
        let mut allocator = allocator();
        let mut ptrs = [None; 64];
        for (i, slot) in ptrs.iter_mut().enumerate() {
            let ptr = allocator.malloc(16).unwrap();
            unsafe { ptr.as_ptr().write(i as u8) };
            *slot = Some(ptr);
        }
        for (i, ptr) in ptrs.iter().enumerate() {
            let ptr = ptr.unwrap();
            assert_eq!(unsafe { ptr.as_ptr().read() }, i as u8);
        }
        for ptr in ptrs {
            unsafe { allocator.free(ptr.unwrap()) };
        }
        checker::assert_consistent(&allocator.heap);
    }

    #[test]
    fn free_and_realloc_coalesce_back_down_to_one_block() {
        let mut allocator = allocator();
        let a = allocator.malloc(128).unwrap();
        let b = allocator.malloc(128).unwrap();
        let c = allocator.malloc(128).unwrap();
        unsafe {
            allocator.free(a);
            allocator.free(b);
            allocator.free(c);
        }
        assert_eq!(allocator.stats().free_num, 1);
        checker::assert_consistent(&allocator.heap);
    }

    #[test]
    fn extends_heap_on_miss() {
        let mut allocator = RawAllocator::init(FixedRegion::<HUGE_HEAP>::new()).unwrap();
        let before = allocator.stats().heap_bytes;
        let _huge = allocator.malloc(1_000_000).unwrap();
        assert!(allocator.stats().heap_bytes > before);
        checker::assert_consistent(&allocator.heap);
    }

    #[test]
    fn realloc_preserves_the_leading_payload_bytes() {
        let mut allocator = allocator();
        let ptr = allocator.malloc(40).unwrap();
        unsafe {
            for i in 0..40u8 {
                ptr.as_ptr().add(i as usize).write(i);
            }
        }
        let grown = unsafe { allocator.realloc(ptr, 200) };
        unsafe {
            for i in 0..40u8 {
                assert_eq!(grown.as_ptr().add(i as usize).read(), i);
            }
            allocator.free(grown);
        }
        checker::assert_consistent(&allocator.heap);
    }

    #[test]
    fn bucket_seam_sizes_round_trip() {
        let mut allocator = allocator();
        for size in [1usize, 31, 32, 33, 63, 64, 65, 1023, 1024, 1025, 2000] {
            let ptr = allocator.malloc(size).unwrap();
            unsafe {
                ptr.as_ptr().write_bytes(0xCD, 1);
                allocator.free(ptr);
            }
            checker::assert_consistent(&allocator.heap);
        }
    }
}
