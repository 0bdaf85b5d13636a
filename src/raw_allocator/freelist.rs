//! Segregated free-list maintenance: the ≈10% "Segregated Free List
//! Directory" component.
//!
//! Each bucket is a LIFO doubly-linked list threaded through the payload of
//! its own free blocks (`next` at offset 0, `prev` at offset 8 from the
//! payload start), with the directory slot acting as the list head. Both
//! operations below are O(1); neither walks a list.

use super::bucket::classify;
use super::heap::{self, BlockAddr, Heap};
use crate::region::ByteRegionProvider;

/// Push `addr` onto the head of its size class's free list.
///
/// # Safety
/// `addr` must name a free block not already linked into any free list.
pub(crate) unsafe fn add_free<P: ByteRegionProvider>(heap: &mut Heap<P>, addr: BlockAddr) {
    let bucket = unsafe { classify(heap::read_header(addr).size()) };
    let old_head = unsafe { heap.directory_head(bucket) };

    unsafe {
        heap::set_link_next(addr, old_head);
        heap::set_link_prev(addr, None);
        if let Some(old_head) = old_head {
            heap::set_link_prev(old_head, Some(addr));
        }
        heap.set_directory_head(bucket, Some(addr));
    }

    heap.free_num += 1;
}

/// Unlink `addr` from its size class's free list.
///
/// # Safety
/// `addr` must name a free block currently linked into its bucket's free
/// list (i.e. previously passed to [`add_free`] and not since removed).
pub(crate) unsafe fn remove_free<P: ByteRegionProvider>(heap: &mut Heap<P>, addr: BlockAddr) {
    let bucket = unsafe { classify(heap::read_header(addr).size()) };
    let prev = unsafe { heap::link_prev(addr) };
    let next = unsafe { heap::link_next(addr) };

    match prev {
        Some(prev) => unsafe { heap::set_link_next(prev, next) },
        None => unsafe { heap.set_directory_head(bucket, next) },
    }
    if let Some(next) = next {
        unsafe { heap::set_link_prev(next, prev) };
    }

    heap.free_num -= 1;
}
