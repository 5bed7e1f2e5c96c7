//! Implementation of the Platform trait over the system heap.

use core::{alloc::Layout, ptr::NonNull};

use std::alloc;

use fbpool_core::Platform;

/// The system heap as a `Platform`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPlatform;

impl SystemPlatform {
    /// Creates an instance.
    pub const fn new() -> Self { Self }
}

impl Platform for SystemPlatform {
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);

        //  Safety:
        //  -   `layout` has a non-zero size, as per the trait contract.
        NonNull::new(alloc::alloc(layout))
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        //  Safety:
        //  -   `pointer` was returned by `alloc` with `layout`, as per the trait contract.
        alloc::dealloc(pointer.as_ptr(), layout);
    }
}

// mod tests
