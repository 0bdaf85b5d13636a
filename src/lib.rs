//! Segregated-fit allocator for embedded `#![no_std]` targets.
//!
//! This crate provides a single type called [`Allocator`]. Like other
//! allocators built for this niche, it implements the
//! [`core::alloc::GlobalAlloc`]-trait, which is required to use the
//! [`alloc`-crate][alloc] on `#![no_std]`-targets. Unlike a fixed-buffer
//! allocator, this one does not own its memory: it grows a single
//! contiguous region on demand through a [`ByteRegionProvider`] you supply
//! (think `sbrk`, or a bump pointer into a linker-reserved range).
//!
//! # Usage
//! Implement [`ByteRegionProvider`] for whatever can grow your platform's
//! heap region (a linker symbol plus an MPU-protected range, a `mmap`
//! wrapper, ...), then wire it up as the global allocator:
//! ```no_run
//! # use core::ptr::NonNull;
//! # use segfit::{Allocator, ByteRegionProvider, OutOfMemory};
//! struct MyRegion { /* ... */ }
//! impl ByteRegionProvider for MyRegion {
//!     fn region_grow(&mut self, n_bytes: usize) -> Result<NonNull<u8>, OutOfMemory> {
//!         # unimplemented!()
//!     }
//! }
//!
//! #[global_allocator]
//! static ALLOCATOR: Allocator<MyRegion> = Allocator::new(MyRegion { /* ... */ });
//!
//! extern crate alloc;
//! ```
//! Afterwards you don't need to interact with the crate or the variable
//! `ALLOCATOR` anymore. Now you can just `use alloc::vec::Vec` or even
//! `use alloc::collections::HashMap`, i.e. every fancy collection which is
//! normally provided by `std`.
//!
//! # Implementation
//! The heap is one contiguous, monotonically-growing region. Every block
//! (free or allocated) begins with an 8-byte header: a size field (with the
//! allocation state packed into its low bit, since sizes are always
//! multiples of 8) and the size of the physically preceding block, which
//! lets `free` step backward without a trailing footer. Free blocks are
//! threaded into one of 47 segregated, doubly-linked, LIFO free lists,
//! chosen by a bucket classifier that is geometric (powers of two) below
//! 1024 bytes and a fixed arithmetic stride above it. `malloc` does a
//! segregated first-fit; misses grow the heap and retry. `free` coalesces
//! with any physically adjacent free neighbor in O(1), using the
//! previous-block-size field to find the left neighbor without a scan.
//! `realloc` is the naive textbook version: always a fresh allocation plus a
//! copy, never an in-place grow.
//!
//! This crate assumes single-threaded use; see [`RawAllocator`]'s
//! `#[cfg(test)]`-only module docs and `DESIGN.md` in the repository for the
//! full set of invariants and non-goals.
//!
//! [alloc]: https://doc.rust-lang.org/alloc/index.html
#![no_std]

mod error;
mod raw_allocator;
mod region;

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use spin::Mutex;

pub use error::OutOfMemory;
pub use region::ByteRegionProvider;
use raw_allocator::RawAllocator;
#[cfg(feature = "internal-stats")]
pub use raw_allocator::Stats;

/// The memory allocator for embedded systems.
///
/// This is the core type of this crate. Construct one with [`Allocator::new`]
/// over your [`ByteRegionProvider`] and assign it to a `static` with
/// `#[global_allocator]`.
///
/// Internally this wraps a [`RawAllocator`] behind a [`spin::Mutex`] purely
/// to satisfy [`GlobalAlloc::alloc`]'s `&self` receiver: the allocator itself
/// is not designed for concurrent use (see the crate docs' Non-goals), and
/// the lock is never contended in the single-threaded usage this crate
/// targets.
pub struct Allocator<P: ByteRegionProvider> {
    inner: Mutex<State<P>>,
}

enum State<P: ByteRegionProvider> {
    /// Not yet backed by any heap memory; `region_grow` is only ever called
    /// lazily, on the first allocation, so that constructing an `Allocator`
    /// stays a `const fn`.
    Uninit(Option<P>),
    Ready(RawAllocator<P>),
    /// The provider failed to supply the initial heap image. Sticky: every
    /// subsequent allocation fails too, rather than retrying forever.
    FailedInit,
}

impl<P: ByteRegionProvider> Allocator<P> {
    /// Create a new [`Allocator`] over the given byte-region provider.
    ///
    /// This function is a `const fn`, so you can assign it directly to a
    /// `static`. The provider is not touched until the first allocation.
    #[must_use = "assign the allocator to a static variable and apply the `#[global_allocator]`-attribute to make it the global allocator"]
    pub const fn new(provider: P) -> Self {
        Self {
            inner: Mutex::new(State::Uninit(Some(provider))),
        }
    }

    /// A read-only snapshot of heap size and free-list occupancy.
    ///
    /// Returns `None` before the first allocation has lazily initialized
    /// the heap, or if that initialization failed. Requires the
    /// `internal-stats` feature; see the crate docs' Non-goals for why this
    /// is not part of the default public surface (the spec this crate
    /// implements tracks no per-allocation metadata beyond the block
    /// header, and this is heap-wide, not per-allocation, bookkeeping).
    #[cfg(feature = "internal-stats")]
    pub fn stats(&self) -> Option<Stats> {
        let guard = self.inner.lock();
        match &*guard {
            State::Ready(raw) => Some(raw.stats()),
            State::Uninit(_) | State::FailedInit => None,
        }
    }

    /// Walk the heap and the free-list directory, panicking if any of
    /// invariants I1–I8 (spec.md §3) don't hold.
    ///
    /// Does nothing before the first allocation has lazily initialized the
    /// heap. Requires the `internal-checker` feature; this is how the
    /// `tests/` integration crate reaches the checker that otherwise lives
    /// behind `raw_allocator`'s private module boundary.
    #[cfg(feature = "internal-checker")]
    pub fn assert_consistent(&self) {
        let guard = self.inner.lock();
        if let State::Ready(raw) = &*guard {
            raw.assert_consistent();
        }
    }
}

// SAFETY: `GlobalAlloc` only ever hands out 8-byte-aligned memory (see
// `alloc`/`dealloc` below, which reject larger alignments), matching the
// guarantee `RawAllocator` provides.
unsafe impl<P: ByteRegionProvider> GlobalAlloc for Allocator<P> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > 8 {
            // Out of scope: see the crate's Non-goals. A caller asking for
            // stricter alignment than this allocator ever provides gets a
            // null pointer, same as any other allocation failure.
            return core::ptr::null_mut();
        }

        let mut guard = self.inner.lock();
        let raw = match &mut *guard {
            State::Ready(raw) => raw,
            State::FailedInit => return core::ptr::null_mut(),
            State::Uninit(provider) => {
                let provider = provider.take().expect("Uninit always holds a provider");
                match RawAllocator::init(provider) {
                    Ok(raw) => {
                        *guard = State::Ready(raw);
                        match &mut *guard {
                            State::Ready(raw) => raw,
                            _ => unreachable!(),
                        }
                    }
                    Err(_) => {
                        *guard = State::FailedInit;
                        return core::ptr::null_mut();
                    }
                }
            }
        };

        match raw.malloc(layout.size()) {
            Some(ptr) => ptr.as_ptr(),
            None => core::ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut guard = self.inner.lock();
        if let State::Ready(raw) = &mut *guard {
            // SAFETY: forwarded from the caller's `GlobalAlloc::dealloc`
            // contract: `ptr` came from `alloc`/`realloc` on this allocator
            // and has not already been freed.
            unsafe { raw.free(NonNull::new_unchecked(ptr)) };
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        let mut guard = self.inner.lock();
        match &mut *guard {
            State::Ready(raw) => {
                // SAFETY: forwarded from the caller's `GlobalAlloc::realloc`
                // contract.
                unsafe { raw.realloc(NonNull::new_unchecked(ptr), new_size) }.as_ptr()
            }
            _ => core::ptr::null_mut(),
        }
    }
}
