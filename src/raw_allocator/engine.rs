//! The allocation engine: `find_fit`, `place`, `coalesce`, `extend_heap` and
//! the public `malloc`/`free`/`realloc` entry points built on top of them.
//! This is the ≈70%-of-the-budget "Allocation Engine" component; everything
//! else in `raw_allocator` exists to let this module stay free of raw
//! pointer bookkeeping.

use core::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::region::ByteRegionProvider;

use super::bucket::{classify, next_power_of_two};
use super::freelist;
use super::header::BlockHeader;
use super::heap::{self, BlockAddr, Heap};
use super::tunables::{
    EXTEND_SIZE, HEADER_SIZE, LARGE_BUCKET_FLOOR, MIN_BLOCK_SIZE, NUM_BUCKETS, SMOOTH_MAX,
    SMOOTH_MIN,
};

/// Re-walk the whole heap and directory after a public call, panicking on
/// the first invariant (I1–I8, §3) that doesn't hold. Compiled to nothing
/// in release builds (`cfg(debug_assertions)` is false there), the same
/// `debug_assert!`-style cost model as the rest of this crate's internal
/// checking — see SPEC_FULL.md §10.6.
#[cfg(debug_assertions)]
fn debug_check_consistency<P: ByteRegionProvider>(heap: &Heap<P>) {
    super::checker::assert_consistent(heap);
}

#[cfg(not(debug_assertions))]
fn debug_check_consistency<P: ByteRegionProvider>(_heap: &Heap<P>) {}

/// Promote a request in the `(SMOOTH_MIN, SMOOTH_MAX)` window to the next
/// power of two if it is already within an eighth of it, trading a bit of
/// internal fragmentation for fewer distinct block sizes in that range.
fn smooth_size(size: usize) -> usize {
    if size > SMOOTH_MIN && size < SMOOTH_MAX {
        let rounded = next_power_of_two(size as u32) as usize;
        if size >= rounded - rounded / 8 {
            return rounded;
        }
    }
    size
}

/// Turn a caller-requested payload size into the header-inclusive,
/// 8-byte-aligned, at-least-`MIN_BLOCK_SIZE` block size `find_fit`/`place`
/// work with.
fn asize_for(size: usize) -> u32 {
    let smoothed = smooth_size(size);
    let needed = smoothed + HEADER_SIZE;
    let aligned = (needed + 7) & !7;
    core::cmp::max(aligned, MIN_BLOCK_SIZE) as u32
}

/// Walk one bucket's free list looking for the first block of at least
/// `asize` bytes.
///
/// # Safety
/// `bucket` must be `< NUM_BUCKETS` and the bucket's free list must be
/// well-formed.
unsafe fn scan_bucket<P: ByteRegionProvider>(
    heap: &Heap<P>,
    bucket: usize,
    asize: u32,
) -> Option<BlockAddr> {
    let mut current = unsafe { heap.directory_head(bucket) };
    while let Some(addr) = current {
        let header = unsafe { heap::read_header(addr) };
        if header.size() >= asize {
            return Some(addr);
        }
        current = unsafe { heap::link_next(addr) };
    }
    None
}

/// Find a free block of at least `asize` bytes, or `None` if the heap must
/// grow.
///
/// Buckets at or above [`LARGE_BUCKET_FLOOR`] cover a huge size range each,
/// so once the search reaches one of them it scans top-down from the
/// overflow bucket: a block there is as likely to fit as one in the
/// requested bucket, and checking the biggest buckets first tends to turn
/// up a leftover large block instead of fragmenting a fresh one. The same
/// top-down scan kicks in when the heap holds exactly one free block, since
/// in that case there is nothing to gain from an ascending walk either. In
/// every other case the search walks buckets from smallest viable upward,
/// which is a plain first-fit.
///
/// # Safety
/// The heap's directory and free lists must be well-formed.
pub(crate) unsafe fn find_fit<P: ByteRegionProvider>(
    heap: &Heap<P>,
    asize: u32,
) -> Option<BlockAddr> {
    let start_bucket = classify(asize);
    let top_down = start_bucket >= LARGE_BUCKET_FLOOR || heap.free_num <= 1;

    if top_down {
        for bucket in (start_bucket..NUM_BUCKETS).rev() {
            if let Some(addr) = unsafe { scan_bucket(heap, bucket, asize) } {
                return Some(addr);
            }
        }
    } else {
        for bucket in start_bucket..NUM_BUCKETS {
            if let Some(addr) = unsafe { scan_bucket(heap, bucket, asize) } {
                return Some(addr);
            }
        }
    }
    None
}

/// Carve `asize` bytes out of the free block at `addr`, splitting off and
/// re-freeing the remainder when it is large enough to hold a block of its
/// own.
///
/// # Safety
/// `addr` must name a free block, currently linked into its bucket's free
/// list, of at least `asize` bytes.
pub(crate) unsafe fn place<P: ByteRegionProvider>(heap: &mut Heap<P>, addr: BlockAddr, asize: u32) {
    let header = unsafe { heap::read_header(addr) };
    let free_size = header.size();
    unsafe { freelist::remove_free(heap, addr) };

    let remainder = free_size - asize;
    if remainder >= MIN_BLOCK_SIZE as u32 {
        unsafe {
            heap::write_header(addr, BlockHeader::new(asize, true, header.prev_size()));

            let split_addr = heap::addr_add(addr, asize);
            heap::write_header(split_addr, BlockHeader::new(remainder, false, asize));

            let next_addr = heap::addr_add(split_addr, remainder);
            let mut next_header = heap::read_header(next_addr);
            next_header.set_prev_size(remainder);
            heap::write_header(next_addr, next_header);

            freelist::add_free(heap, split_addr);
        }
    } else {
        unsafe { heap::write_header(addr, BlockHeader::new(free_size, true, header.prev_size())) };
    }
}

/// Merge `addr`'s block with any physically adjacent free neighbors.
///
/// Returns the address of the (possibly unchanged) merged block. Any
/// neighbor that was free is unlinked from its bucket's free list; `addr`
/// itself is assumed not yet linked into any free list (the caller inserts
/// the result with [`freelist::add_free`] once coalescing is done).
///
/// # Safety
/// `addr` must name a free, unlinked block with valid headers on both
/// physical sides (the prologue and epilogue sentinels are always
/// "allocated", which keeps the four match arms below from ever stepping
/// off the ends of the heap).
unsafe fn coalesce<P: ByteRegionProvider>(heap: &mut Heap<P>, addr: BlockAddr) -> BlockAddr {
    let header = unsafe { heap::read_header(addr) };
    let size = header.size();
    let prev_size = header.prev_size();

    let prev_addr = (prev_size != 0).then(|| unsafe { heap::prev_block_addr(addr) });
    let next_addr = unsafe { heap::next_block_addr(addr) };

    let prev_free = prev_addr
        .map(|p| unsafe { heap::read_header(p) }.is_free())
        .unwrap_or(false);
    let next_free = unsafe { heap::read_header(next_addr) }.is_free();

    match (prev_free, next_free) {
        (false, false) => addr,

        (false, true) => unsafe {
            let next_header = heap::read_header(next_addr);
            freelist::remove_free(heap, next_addr);

            let new_size = size + next_header.size();
            heap::write_header(addr, BlockHeader::new(new_size, false, prev_size));

            let after = heap::next_block_addr(addr);
            let mut after_header = heap::read_header(after);
            after_header.set_prev_size(new_size);
            heap::write_header(after, after_header);

            addr
        },

        (true, false) => unsafe {
            let prev_addr = prev_addr.expect("prev_free implies prev_addr is Some");
            let prev_header = heap::read_header(prev_addr);
            freelist::remove_free(heap, prev_addr);

            let new_size = prev_header.size() + size;
            heap::write_header(
                prev_addr,
                BlockHeader::new(new_size, false, prev_header.prev_size()),
            );

            let mut next_header = heap::read_header(next_addr);
            next_header.set_prev_size(new_size);
            heap::write_header(next_addr, next_header);

            prev_addr
        },

        (true, true) => unsafe {
            let prev_addr = prev_addr.expect("prev_free implies prev_addr is Some");
            let prev_header = heap::read_header(prev_addr);
            let next_header = heap::read_header(next_addr);
            freelist::remove_free(heap, prev_addr);
            freelist::remove_free(heap, next_addr);

            let new_size = prev_header.size() + size + next_header.size();
            heap::write_header(
                prev_addr,
                BlockHeader::new(new_size, false, prev_header.prev_size()),
            );

            let after = heap::next_block_addr(prev_addr);
            let mut after_header = heap::read_header(after);
            after_header.set_prev_size(new_size);
            heap::write_header(after, after_header);

            prev_addr
        },
    }
}

/// Grow the heap by at least `min_size` bytes (rounded up to `EXTEND_SIZE`
/// and to a multiple of 8), turning the old epilogue into the header of a
/// fresh free block, coalescing it with a free predecessor if there is one,
/// and linking the result into the directory.
///
/// # Safety
/// The heap must be well-formed and its epilogue address current.
unsafe fn extend_heap<P: ByteRegionProvider>(
    heap: &mut Heap<P>,
    min_size: u32,
) -> Result<BlockAddr, OutOfMemory> {
    let grow_size = core::cmp::max(min_size as usize, EXTEND_SIZE);
    let grow_size = (grow_size + 7) & !7;

    let old_epilogue_addr = heap.epilogue_addr();
    let prev_size = unsafe { heap::read_header(old_epilogue_addr) }.prev_size();

    let grown = heap.grow(grow_size)?;
    debug_assert_eq!(
        grown, old_epilogue_addr,
        "byte-region provider did not grow contiguously"
    );

    let new_block_addr = old_epilogue_addr;
    let new_block_size = grow_size as u32;
    // SAFETY: `grow_size` freshly-grown bytes start exactly at the old
    // epilogue's address.
    unsafe {
        heap::write_header(
            new_block_addr,
            BlockHeader::new(new_block_size, false, prev_size),
        );

        let new_epilogue_addr = heap::addr_add(new_block_addr, new_block_size);
        heap::write_header(new_epilogue_addr, BlockHeader::epilogue(new_block_size));
        heap.set_epilogue_addr(new_epilogue_addr);

        let coalesced = coalesce(heap, new_block_addr);
        freelist::add_free(heap, coalesced);
        Ok(coalesced)
    }
}

/// Allocate a block able to hold `size` bytes, returning a pointer to its
/// payload.
///
/// # Safety
/// The heap must have been initialized with [`Heap::init`].
pub(crate) unsafe fn malloc<P: ByteRegionProvider>(
    heap: &mut Heap<P>,
    size: usize,
) -> Result<NonNull<u8>, OutOfMemory> {
    let asize = asize_for(size);

    let block_addr = match unsafe { find_fit(heap, asize) } {
        Some(addr) => addr,
        None => unsafe { extend_heap(heap, asize)? },
    };
    unsafe { place(heap, block_addr, asize) };

    debug_check_consistency(heap);
    Ok(heap::payload_addr(block_addr))
}

/// Return `ptr`'s block to the free lists, coalescing with any free
/// physical neighbors.
///
/// # Safety
/// `ptr` must have come from [`malloc`] or [`realloc`] on this heap and must
/// not have already been freed.
pub(crate) unsafe fn free<P: ByteRegionProvider>(heap: &mut Heap<P>, ptr: NonNull<u8>) {
    let addr = heap::block_addr_from_payload(ptr);

    let mut header = unsafe { heap::read_header(addr) };
    header.clear_alloc();
    unsafe { heap::write_header(addr, header) };

    let coalesced = unsafe { coalesce(heap, addr) };
    unsafe { freelist::add_free(heap, coalesced) };

    debug_check_consistency(heap);
}

/// Resize `ptr`'s allocation to `new_size` bytes.
///
/// This is the naive textbook `realloc`: it always allocates a fresh block
/// and copies the old payload into it. The copy always starts at the old
/// *payload* (`ptr`), but its length is `min(old_block_size, new_size)`
/// rather than `min(old_payload_size, new_size)` — `old_block_size` counts
/// the 8-byte header as if it were copyable payload. So whenever the copy
/// is capped by `old_block_size`, it reads up to `HEADER_SIZE` bytes past
/// the true end of the old payload (into whatever immediately follows the
/// old block in the heap) instead of stopping exactly at the payload's own
/// length. This is a known quirk of the reference implementation,
/// reproduced here rather than fixed; it never shifts where the preserved
/// bytes land in the new payload.
///
/// # Panics
/// Panics if the heap cannot grow enough to satisfy the request; this
/// mirrors the reference implementation's behavior of terminating on a
/// fatal out-of-memory condition during `realloc`.
///
/// # Safety
/// `ptr` must have come from [`malloc`] or [`realloc`] on this heap and must
/// not have already been freed.
pub(crate) unsafe fn realloc<P: ByteRegionProvider>(
    heap: &mut Heap<P>,
    ptr: NonNull<u8>,
    new_size: usize,
) -> NonNull<u8> {
    let old_addr = heap::block_addr_from_payload(ptr);
    let old_block_size = unsafe { heap::read_header(old_addr) }.size() as usize;

    let new_ptr =
        unsafe { malloc(heap, new_size) }.expect("out of memory servicing realloc");

    let copy_len = core::cmp::min(old_block_size, new_size);
    // SAFETY: `ptr` has `old_block_size - HEADER_SIZE` bytes of true
    // payload, but `copy_len` may run up to `HEADER_SIZE` bytes past that
    // (the documented quirk above) into the next block's header, which is
    // always valid heap memory (invariant I3: no gaps between blocks).
    // `new_ptr` is freshly allocated with room for at least `new_size`
    // bytes, and `copy_len` never exceeds that either.
    unsafe {
        core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), copy_len);
        free(heap, ptr);
    }

    new_ptr
}
