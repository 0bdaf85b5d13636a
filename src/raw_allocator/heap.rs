//! Owns the provider and the raw heap image: the storage half of the
//! "Header/Block Layout" and "Segregated Free List Directory" components.
//!
//! `Heap` knows how to read and write headers, free-list link pointers and
//! directory slots at a given address. It does not know how to find a fit,
//! split a block or coalesce neighbors — that is [`super::engine`]'s job.
//! The split mirrors the teacher's `Buffer`/`RawAllocator` separation: one
//! type for "safe-ish access to raw memory", one for "the algorithm built on
//! top of it".

use core::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::region::ByteRegionProvider;

use super::header::BlockHeader;
use super::tunables::{CHUNKSIZE, DIRECTORY_BYTES, HEADER_SIZE};

/// The address of a block: a pointer to the first byte of its header.
pub(crate) type BlockAddr = NonNull<u8>;

/// # Safety
/// `addr + offset` must stay within the heap region.
pub(crate) unsafe fn addr_add(addr: BlockAddr, offset: u32) -> BlockAddr {
    unsafe { NonNull::new_unchecked(addr.as_ptr().add(offset as usize)) }
}

/// # Safety
/// `addr - offset` must stay within the heap region.
pub(crate) unsafe fn addr_sub(addr: BlockAddr, offset: u32) -> BlockAddr {
    unsafe { NonNull::new_unchecked(addr.as_ptr().sub(offset as usize)) }
}

pub(crate) fn payload_addr(addr: BlockAddr) -> BlockAddr {
    // SAFETY: every block has at least `HEADER_SIZE` bytes.
    unsafe { addr_add(addr, HEADER_SIZE as u32) }
}

pub(crate) fn block_addr_from_payload(payload: BlockAddr) -> BlockAddr {
    // SAFETY: `payload` was produced by `payload_addr` on some block.
    unsafe { addr_sub(payload, HEADER_SIZE as u32) }
}

/// # Safety
/// `addr` must point at a valid, initialized block header.
pub(crate) unsafe fn read_header(addr: BlockAddr) -> BlockHeader {
    unsafe { (addr.as_ptr() as *const BlockHeader).read() }
}

/// # Safety
/// `addr` must be writable for `BlockHeader::SIZE` bytes.
pub(crate) unsafe fn write_header(addr: BlockAddr, header: BlockHeader) {
    unsafe { (addr.as_ptr() as *mut BlockHeader).write(header) };
}

/// # Safety
/// `addr` must point at a valid, initialized block header.
pub(crate) unsafe fn next_block_addr(addr: BlockAddr) -> BlockAddr {
    let size = unsafe { read_header(addr) }.size();
    unsafe { addr_add(addr, size) }
}

/// # Safety
/// `addr` must not be the prologue (i.e. `prev_size() > 0`).
pub(crate) unsafe fn prev_block_addr(addr: BlockAddr) -> BlockAddr {
    let prev_size = unsafe { read_header(addr) }.prev_size();
    unsafe { addr_sub(addr, prev_size) }
}

/// # Safety
/// `addr` must be a free block (its link area must be initialized).
pub(crate) unsafe fn link_next(addr: BlockAddr) -> Option<BlockAddr> {
    let ptr = payload_addr(addr).as_ptr() as *const Option<BlockAddr>;
    unsafe { ptr.read() }
}

/// # Safety
/// `addr` must be a free block.
pub(crate) unsafe fn set_link_next(addr: BlockAddr, next: Option<BlockAddr>) {
    let ptr = payload_addr(addr).as_ptr() as *mut Option<BlockAddr>;
    unsafe { ptr.write(next) };
}

/// # Safety
/// `addr` must be a free block (its link area must be initialized).
pub(crate) unsafe fn link_prev(addr: BlockAddr) -> Option<BlockAddr> {
    let ptr = unsafe { addr_add(payload_addr(addr), 8) }.as_ptr() as *const Option<BlockAddr>;
    unsafe { ptr.read() }
}

/// # Safety
/// `addr` must be a free block.
pub(crate) unsafe fn set_link_prev(addr: BlockAddr, prev: Option<BlockAddr>) {
    let ptr = unsafe { addr_add(payload_addr(addr), 8) }.as_ptr() as *mut Option<BlockAddr>;
    unsafe { ptr.write(prev) };
}

pub(crate) struct Heap<P: ByteRegionProvider> {
    provider: P,
    /// Start of the directory (`NUM_BUCKETS` head-pointer slots). The
    /// prologue immediately follows it at `base + DIRECTORY_BYTES`.
    base: BlockAddr,
    /// Address of the current epilogue sentinel, always the last block in
    /// the heap. Tracked explicitly so `extend_heap` doesn't need to walk
    /// the whole heap just to find where to reuse its header.
    epilogue_addr: BlockAddr,
    pub(crate) free_num: u32,
}

// SAFETY: `Heap` exclusively owns every byte its `NonNull<u8>` fields point
// into (the provider contract guarantees nothing else can alias them), so
// it can move between threads just like the `P` it wraps. It is never
// accessed from two threads at once in practice: `Allocator` only reaches
// it through a `spin::Mutex`, and `ByteRegionProvider::region_grow` is
// documented as non-reentrant.
unsafe impl<P: ByteRegionProvider + Send> Send for Heap<P> {}

impl<P: ByteRegionProvider> Heap<P> {
    /// Request the directory and the initial heap image from `provider`,
    /// write the prologue, the single initial free block and the epilogue,
    /// and insert that free block into the directory.
    pub(crate) fn init(mut provider: P) -> Result<Self, OutOfMemory> {
        let base = provider.region_grow(DIRECTORY_BYTES)?;
        // SAFETY: `region_grow` just handed us exactly `DIRECTORY_BYTES`
        // freshly-grown, writable bytes.
        unsafe { base.as_ptr().write_bytes(0, DIRECTORY_BYTES) };

        let prologue_addr = provider.region_grow(CHUNKSIZE)?;
        debug_assert_eq!(
            prologue_addr.as_ptr(),
            // SAFETY: staying within the just-grown directory region.
            unsafe { base.as_ptr().add(DIRECTORY_BYTES) },
            "byte-region provider did not grow contiguously"
        );

        // SAFETY: `prologue_addr` and everything up to `CHUNKSIZE` bytes
        // past it is freshly-grown, writable memory.
        let (initial_addr, epilogue_addr, initial_size) = unsafe {
            write_header(prologue_addr, BlockHeader::prologue());

            let initial_addr = addr_add(prologue_addr, BlockHeader::SIZE as u32);
            // `CHUNKSIZE` bytes hold: prologue header (8) + initial free
            // block + epilogue header (8). `initial_size` is whatever is
            // left, already a multiple of 8 since CHUNKSIZE is.
            let initial_size = (CHUNKSIZE - 2 * HEADER_SIZE) as u32;
            debug_assert_eq!(initial_size & 0b111, 0);
            write_header(
                initial_addr,
                BlockHeader::new(initial_size, false, BlockHeader::SIZE as u32),
            );

            let epilogue_addr = addr_add(initial_addr, initial_size);
            write_header(epilogue_addr, BlockHeader::epilogue(initial_size));

            (initial_addr, epilogue_addr, initial_size)
        };
        let _ = initial_size;

        let mut heap = Self {
            provider,
            base,
            epilogue_addr,
            free_num: 0,
        };
        // SAFETY: `initial_addr` names the free block just written above,
        // not yet linked into any free list.
        unsafe { super::freelist::add_free(&mut heap, initial_addr) };

        Ok(heap)
    }

    /// Grow the underlying region by `n_bytes`, returning a pointer to the
    /// first newly-added byte (which, per the provider contract, directly
    /// follows whatever this `Heap` previously obtained — i.e. the old
    /// epilogue).
    pub(crate) fn grow(&mut self, n_bytes: usize) -> Result<BlockAddr, OutOfMemory> {
        self.provider.region_grow(n_bytes)
    }

    pub(crate) fn prologue_addr(&self) -> BlockAddr {
        // SAFETY: `base + DIRECTORY_BYTES` is within the region `init`
        // requested and never moves.
        unsafe { addr_add(self.base, DIRECTORY_BYTES as u32) }
    }

    pub(crate) fn epilogue_addr(&self) -> BlockAddr {
        self.epilogue_addr
    }

    pub(crate) fn set_epilogue_addr(&mut self, addr: BlockAddr) {
        self.epilogue_addr = addr;
    }

    // -- directory access -------------------------------------------------

    /// # Safety
    /// `bucket` must be `< NUM_BUCKETS`.
    pub(crate) unsafe fn directory_head(&self, bucket: usize) -> Option<BlockAddr> {
        let ptr = self.base.as_ptr().add(bucket * 8) as *const Option<BlockAddr>;
        unsafe { ptr.read() }
    }

    /// # Safety
    /// `bucket` must be `< NUM_BUCKETS`.
    pub(crate) unsafe fn set_directory_head(&mut self, bucket: usize, head: Option<BlockAddr>) {
        let ptr = unsafe { self.base.as_ptr().add(bucket * 8) } as *mut Option<BlockAddr>;
        unsafe { ptr.write(head) };
    }

    #[cfg(any(test, feature = "internal-stats"))]
    pub(crate) fn heap_bytes(&self) -> usize {
        // Walk from the prologue to the epilogue to total up live heap bytes.
        let mut addr = self.prologue_addr();
        let mut total = 0usize;
        loop {
            // SAFETY: walking a well-formed heap from its prologue.
            let header = unsafe { read_header(addr) };
            total += header.size() as usize;
            if header.size() == 0 {
                break;
            }
            addr = unsafe { next_block_addr(addr) };
        }
        total
    }

    /// Total bytes currently linked into any bucket's free list, summed
    /// straight from the directory rather than the block chain.
    #[cfg(any(test, feature = "internal-stats"))]
    pub(crate) fn free_bytes(&self) -> usize {
        use super::tunables::NUM_BUCKETS;

        let mut total = 0usize;
        for bucket in 0..NUM_BUCKETS {
            // SAFETY: `bucket < NUM_BUCKETS`.
            let mut addr = unsafe { self.directory_head(bucket) };
            while let Some(current) = addr {
                // SAFETY: walking a well-formed free list.
                total += unsafe { read_header(current) }.size() as usize;
                addr = unsafe { link_next(current) };
            }
        }
        total
    }
}
