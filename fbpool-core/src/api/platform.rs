//! Platform
//!
//! The Platform trait is the pool's sole source of raw memory. Abstracting it keeps fbpool-core
//! free-standing: hosts plug in the system heap, tests plug in a counting or failing source.

use core::{
    alloc::Layout,
    ptr::NonNull,
};

/// Abstraction of the raw memory source backing arenas and the fallback path.
pub trait Platform {
    /// Allocates a fresh region of memory as per the specified layout.
    ///
    /// Returns None if the request cannot be satisfied.
    ///
    /// #   Safety
    ///
    /// The caller may assume that if a pointer is returned then:
    /// -   The number of usable bytes is greater than or equal to `layout.size()`.
    /// -   The pointer is at least aligned to `layout.align()`.
    ///
    /// `allocate` assumes that:
    /// -   `layout.size()` is non-zero.
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a region of memory previously obtained from `allocate`.
    ///
    /// #   Safety
    ///
    /// The caller should no longer reference the memory after calling this function.
    ///
    /// `deallocate` assumes that:
    /// -   `pointer` was returned by `allocate` on this instance, with `layout` as argument.
    /// -   `pointer` is the value returned, and not an interior pointer.
    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout);
}

impl<P> Platform for &P
    where
        P: Platform + ?Sized
{
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> { (**self).allocate(layout) }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) { (**self).deallocate(pointer, layout) }
}
