#![deny(missing_docs)]

//! Exposition of the PoolAllocator API via a C ABI.
//!
//! Every entry point operates on the calling thread's pool: a block must be freed by the thread
//! that allocated it, before that thread exits.

use std::alloc::Layout;
use std::ptr::{self, NonNull};

use fbpool::PoolAllocator;

/// Constructs the calling thread's pool ahead of the first allocation.
///
/// Returns 0 on success, and a negative value otherwise.
///
/// Failure indicates that the system heap could not back the pool's ladder; `fb_malloc` on this
/// thread will keep returning NULL.
#[cold]
#[no_mangle]
pub extern "C" fn fb_warm_up() -> i32 { if PoolAllocator::new().warm_up().is_ok() { 0 } else { -1 } }

/// Allocates `size` bytes of memory, generally suitably aligned.
///
/// If the allocation fails, the returned pointer is NULL.
///
/// If the allocation succeeds, the pointer is aligned on the greatest power of 2 which divides
/// `size`, capped at 64; this guarantees the pointer is suitably aligned for any type of size
/// `size`:
///
/// -   The alignment of the type for which memory is allocated must be a power of 2.
/// -   The size of the type for which memory is allocated must be a multiple of its alignment.
/// -   Therefore, the greatest power of 2 which divides `size` is greater than the required
///     alignment.
#[no_mangle]
pub extern "C" fn fb_malloc(size: usize) -> *mut u8 {
    let alignment = if size == 0 { 1 } else { 1usize << size.trailing_zeros().min(6) };

    //  Safety:
    //  -   `alignment` is non-zero, and a power of 2.
    //  -   `size` does not overflow when rounded up to `alignment`, being a multiple of it.
    let layout = unsafe { Layout::from_size_align_unchecked(size, alignment) };

    allocate(layout)
}

/// Allocates `size` bytes of memory, aligned as specified.
///
/// If `alignment` is not a power of 2, or the allocation fails, the returned pointer is NULL.
#[no_mangle]
pub extern "C" fn fb_aligned_malloc(size: usize, alignment: usize) -> *mut u8 {
    match Layout::from_size_align(size, alignment) {
        Ok(layout) => allocate(layout),
        Err(_) => ptr::null_mut(),
    }
}

/// Deallocates the memory located at `pointer`.
///
/// A NULL `pointer` is tolerated, and ignored.
///
/// #   Safety
///
/// -   Assumes `pointer` was returned by `fb_malloc` or `fb_aligned_malloc` on this thread, and
///     has not been freed since.
/// -   Assumes the memory pointed to by `pointer` is no longer in use.
#[no_mangle]
pub unsafe extern "C" fn fb_free(pointer: *mut u8) {
    if let Some(pointer) = NonNull::new(pointer) {
        PoolAllocator::new().deallocate(pointer);
    }
}

//
//  Implementation
//

fn allocate(layout: Layout) -> *mut u8 {
    PoolAllocator::new().allocate(layout).map(|pointer| pointer.as_ptr()).unwrap_or(ptr::null_mut())
}
