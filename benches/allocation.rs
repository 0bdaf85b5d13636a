#![feature(test)]
extern crate test;
use test::Bencher;

use std::alloc::{GlobalAlloc as _, Layout};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use segfit::{ByteRegionProvider, OutOfMemory};

/// A fixed-size [`ByteRegionProvider`] test double, the same shape as the
/// one the integration tests use under `tests/common`: benches are their
/// own crate target, so it's duplicated here rather than shared.
struct FixedRegion<const N: usize> {
    buf: Box<[MaybeUninit<u8>; N]>,
    used: usize,
}

impl<const N: usize> FixedRegion<N> {
    fn new() -> Self {
        Self {
            buf: Box::new([MaybeUninit::uninit(); N]),
            used: 0,
        }
    }
}

impl<const N: usize> ByteRegionProvider for FixedRegion<N> {
    fn region_grow(&mut self, n_bytes: usize) -> Result<NonNull<u8>, OutOfMemory> {
        if self.used + n_bytes > N {
            return Err(OutOfMemory);
        }
        // SAFETY: `self.used + n_bytes <= N`, checked above.
        let ptr = unsafe { self.buf.as_mut_ptr().add(self.used) } as *mut u8;
        self.used += n_bytes;
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }
}

mod repeated_allocation_deallocation {
    use super::*;

    /// Run a benchmark, which repeatedly allocates and deallocates the same
    /// block. The benchmark will allocate the given amount of blocks beforehand
    /// (before running the actual benchmark) in order to fill up the heap with
    /// unrelated allocations.
    ///
    /// # Panics
    /// This will panic, if the requested pre-allocations will fill up the whole
    /// heap (so the actual benchmark cannot allocate blocks anymore).
    fn benchmark_with_preallocation(b: &mut Bencher, pre_allocations: usize) {
        let allocator = segfit::Allocator::new(FixedRegion::<{ 1 << 20 }>::new());
        // pre-allocate much memory to see the real impact of the segregated search
        for _ in 0..pre_allocations {
            unsafe { allocator.alloc(Layout::new::<u8>()) };
        }

        let layout = Layout::new::<u8>();

        // make sure, that there is enough room for the next allocation
        let ptr = unsafe { allocator.alloc(layout) };
        assert_ne!(ptr, std::ptr::null_mut::<u8>());
        unsafe { allocator.dealloc(ptr, layout) };

        // run actual benchmark: allocate & deallocate the same block repeatedly
        b.iter(|| {
            let ptr = unsafe { allocator.alloc(layout) };
            let ptr = test::black_box(ptr);
            unsafe { allocator.dealloc(ptr, layout) };
        });
    }

    #[bench]
    fn no_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 0);
    }

    #[bench]
    fn low_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 8);
    }

    #[bench]
    fn medium_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 510);
    }

    #[bench]
    fn high_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 1020);
    }
}

mod bucket_sizes {
    use super::*;

    /// A single allocation/deallocation pair at a fixed size, one benchmark
    /// per segregated bucket band (geometric, just past the geometric/
    /// arithmetic seam, and deep in the arithmetic range).
    fn benchmark_size(b: &mut Bencher, size: usize) {
        let allocator = segfit::Allocator::new(FixedRegion::<{ 1 << 20 }>::new());
        let layout = Layout::from_size_align(size, 8).unwrap();

        b.iter(|| {
            let ptr = unsafe { allocator.alloc(layout) };
            let ptr = test::black_box(ptr);
            unsafe { allocator.dealloc(ptr, layout) };
        });
    }

    #[bench]
    fn small_16_bytes(b: &mut Bencher) {
        benchmark_size(b, 16);
    }

    #[bench]
    fn medium_256_bytes(b: &mut Bencher) {
        benchmark_size(b, 256);
    }

    #[bench]
    fn large_4096_bytes(b: &mut Bencher) {
        benchmark_size(b, 4096);
    }
}
