//! The byte-region provider contract.
//!
//! This is the one external collaborator the allocator depends on (the
//! `sbrk`-equivalent described in the crate docs): something that can grow a
//! single contiguous region of bytes on request. Implementing it is
//! explicitly out of scope for this crate — production providers wrap an OS
//! facility (`mmap`, a static arena, a bump pointer into a reserved virtual
//! range); this crate ships only the trait and, behind `#[cfg(test)]`, a
//! minimal test double.

use core::ptr::NonNull;

use crate::error::OutOfMemory;

/// Grows a single contiguous byte region on request.
///
/// # Contract
/// - `region_grow` either returns a pointer to exactly `n_bytes` of newly
///   usable memory, abutting the end of whatever was returned by the
///   previous successful call (or the start of the region, for the first
///   call), or it returns [`OutOfMemory`] and leaves all previously returned
///   memory untouched and still valid.
/// - Every pointer ever returned by `region_grow` remains valid and
///   dereferenceable for the lifetime of the provider: growth never moves
///   or invalidates earlier memory. This is what lets the allocator hold
///   plain pointers into the region instead of base-relative offsets (see
///   `DESIGN.md`).
/// - The region is 8-byte aligned at its start, and every `n_bytes` this
///   allocator requests is itself a multiple of 8, so every returned pointer
///   is 8-byte aligned.
/// - `region_grow` is synchronous and is never called concurrently with
///   itself or any other allocator operation (the allocator as a whole is
///   single-threaded; see the crate docs).
pub trait ByteRegionProvider {
    /// Grow the region by exactly `n_bytes`, returning a pointer to the
    /// first newly-added byte.
    fn region_grow(&mut self, n_bytes: usize) -> Result<NonNull<u8>, OutOfMemory>;
}

/// A minimal [`ByteRegionProvider`] backed by a fixed-size array, used only
/// by this crate's own tests. Not exported: a real embedded target grows its
/// heap from a linker-reserved region or a bump pointer into `.bss`, not
/// from a `const N: usize` array, so this is a test double, not a reference
/// provider.
#[cfg(test)]
pub(crate) mod test_support {
    use core::mem::MaybeUninit;
    use core::ptr::NonNull;

    use super::{ByteRegionProvider, OutOfMemory};

    #[repr(align(8))]
    pub(crate) struct FixedRegion<const N: usize> {
        buf: [MaybeUninit<u8>; N],
        used: usize,
    }

    impl<const N: usize> FixedRegion<N> {
        pub(crate) fn new() -> Self {
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
            // SAFETY: `self.used` is in bounds, checked above.
            let ptr = unsafe { self.buf.as_mut_ptr().add(self.used) } as *mut u8;
            self.used += n_bytes;
            Ok(unsafe { NonNull::new_unchecked(ptr) })
        }
    }
}
