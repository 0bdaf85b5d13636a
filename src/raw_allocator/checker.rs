//! A heap-consistency checker, used only by this crate's own tests to
//! assert the invariants the rest of `raw_allocator` is supposed to
//! maintain. Not part of the public API: shipping a checker to callers is
//! explicitly out of scope (see `DESIGN.md`), but having one in the test
//! suite is what lets the engine tests below do more than "didn't panic".

use super::bucket::classify;
use super::heap::{self, BlockAddr, Heap};
use super::tunables::{MIN_BLOCK_SIZE, NUM_BUCKETS};
use crate::region::ByteRegionProvider;

/// Walk the heap from the prologue to the epilogue and the directory's
/// buckets, and panic if any of the following don't hold:
///
/// - every block's size is a non-zero multiple of 8 (except the epilogue,
///   which is exactly 0) and at least `MIN_BLOCK_SIZE`, except the prologue
///   (8) and epilogue (0);
/// - each block's recorded `prev_size` matches its physical predecessor's
///   actual size;
/// - no two physically adjacent blocks are both free (else `coalesce`
///   missed a merge);
/// - every block reachable from a bucket's free list is marked free, is
///   classified into the bucket it's actually linked into, and its link
///   pointers round-trip (next's prev is back to self, and vice versa);
/// - the number of free blocks found while walking the directory equals
///   `Heap::free_num`.
pub(crate) fn assert_consistent<P: ByteRegionProvider>(heap: &Heap<P>) {
    assert_block_chain_consistent(heap);
    assert_directory_consistent(heap);
}

fn assert_block_chain_consistent<P: ByteRegionProvider>(heap: &Heap<P>) {
    let mut addr = heap.prologue_addr();
    let mut prev_was_free = false;
    loop {
        // SAFETY: walking a well-formed heap from its prologue.
        let header = unsafe { heap::read_header(addr) };
        let size = header.size();

        if size != 0 {
            assert_eq!(size % 8, 0, "block at {addr:?} has a misaligned size");
            assert!(
                size as usize >= MIN_BLOCK_SIZE || size == 8,
                "block at {addr:?} is smaller than MIN_BLOCK_SIZE"
            );
        }

        assert!(
            !(prev_was_free && header.is_free()),
            "two adjacent free blocks at/around {addr:?}: coalesce missed a merge"
        );
        prev_was_free = header.is_free();

        if size == 0 {
            break; // epilogue
        }

        let next = unsafe { heap::next_block_addr(addr) };
        // SAFETY: `next` is always initialized as long as `addr` was.
        let next_header = unsafe { heap::read_header(next) };
        assert_eq!(
            next_header.prev_size(),
            size,
            "block at {next:?} has a stale prev_size"
        );

        addr = next;
    }
}

fn assert_directory_consistent<P: ByteRegionProvider>(heap: &Heap<P>) {
    let mut seen = 0u32;
    for bucket in 0..NUM_BUCKETS {
        // SAFETY: `bucket < NUM_BUCKETS`.
        let mut current = unsafe { heap.directory_head(bucket) };
        let mut prev: Option<BlockAddr> = None;
        while let Some(addr) = current {
            // SAFETY: walking a well-formed free list.
            let header = unsafe { heap::read_header(addr) };
            assert!(header.is_free(), "block at {addr:?} is linked but not free");
            assert_eq!(
                classify(header.size()),
                bucket,
                "block at {addr:?} is linked into the wrong bucket"
            );

            let actual_prev = unsafe { heap::link_prev(addr) };
            assert_eq!(
                actual_prev, prev,
                "broken backward link at {addr:?}"
            );

            seen += 1;
            prev = Some(addr);
            current = unsafe { heap::link_next(addr) };
        }
    }
    assert_eq!(seen, heap.free_num, "free_num disagrees with the directory");
}
