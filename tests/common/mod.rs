//! A fixed-size [`ByteRegionProvider`] test double shared by the
//! integration tests, the way the reference implementation exposes a
//! fixed-`const N` buffer for its own tests. Not part of the crate's public
//! API: a real target grows its heap from a linker-reserved range or
//! `sbrk`/`mmap`, not from a `const N: usize` array.
//!
//! `core`-only so it can be used from both the `#![no_std]` integration
//! tests (which need a `const fn` constructor to build a `static`) and the
//! plain `std` ones.

use core::mem::MaybeUninit;
use core::ptr::NonNull;

use segfit::{ByteRegionProvider, OutOfMemory};

pub struct FixedRegion<const N: usize> {
    buf: [MaybeUninit<u8>; N],
    used: usize,
}

impl<const N: usize> FixedRegion<N> {
    pub const fn new() -> Self {
        Self {
            buf: [MaybeUninit::uninit(); N],
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
