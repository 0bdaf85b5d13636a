mod common;
use common::FixedRegion;

#[test]
fn is_usable_in_const_contexts() {
    const _ALLOCATOR1: segfit::Allocator<FixedRegion<32>> =
        segfit::Allocator::new(FixedRegion::new());
    static _ALLOCATOR2: segfit::Allocator<FixedRegion<32>> =
        segfit::Allocator::new(FixedRegion::new());
}

#[test]
fn supports_global_alloc() {
    fn assert<T: core::alloc::GlobalAlloc>(_: T) {}
    assert(segfit::Allocator::new(FixedRegion::<64>::new()))
}

#[test]
fn too_small_a_region_fails_allocations_gracefully_instead_of_panicking() {
    use core::alloc::{GlobalAlloc, Layout};

    let allocator = segfit::Allocator::new(FixedRegion::<4>::new());
    let layout = Layout::from_size_align(8, 8).unwrap();
    unsafe {
        assert!(allocator.alloc(layout).is_null());
    }
}
