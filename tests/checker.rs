//! The §8 I1–I8 heap-consistency checker, exposed for the integration test
//! suite. The real traversal lives in `src/raw_allocator/checker.rs`, which
//! a separate `tests/` crate can't reach directly (it only sees `pub` items
//! built without `cfg(test)`); this module just forwards to the `pub`
//! method `Cargo.toml`'s `internal-checker` dev-dependency feature unlocks
//! on `Allocator`.

#![allow(dead_code)] // not every test file in this directory uses this one

use segfit::{Allocator, ByteRegionProvider};

/// Walk `allocator`'s heap and free-list directory, panicking if any of
/// invariants I1–I8 (spec.md §3) don't hold.
pub fn assert_consistent<P: ByteRegionProvider>(allocator: &Allocator<P>) {
    allocator.assert_consistent();
}
