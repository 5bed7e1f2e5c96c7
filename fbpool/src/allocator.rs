//! Allocator

use core::{
    cell::RefCell,
    marker::PhantomData,
    ptr::NonNull,
};

use std::alloc::Layout;

use fbpool_core::{BlockPool, PoolConfig, StoreTag};

use crate::SystemPlatform;

/// Handle to the calling thread's block pool.
///
/// The handle is zero-sized and freely copyable; every instance refers to the same per-thread
/// pool. It is deliberately neither `Send` nor `Sync`: a block belongs to the thread that
/// allocated it, and so do the containers drawing from the pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolAllocator(PhantomData<*const ()>);

impl PoolAllocator {
    /// Creates an instance.
    pub const fn new() -> Self { Self(PhantomData) }

    /// Constructs the calling thread's pool ahead of the first allocation.
    ///
    /// Returns Ok if the pool is ready, and Err if the system heap could not back the ladder;
    /// in the latter case, allocations on this thread will keep returning None.
    #[cold]
    pub fn warm_up(&self) -> Result<(), ()> {
        POOL.with(|pool| if pool.borrow_mut().get().is_some() { Ok(()) } else { Err(()) })
    }

    /// Allocates `layout.size()` bytes of memory, aligned on at least `layout.align()`.
    ///
    /// Returns None if the pool could not be constructed, or the system heap is itself
    /// exhausted.
    pub fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        POOL.with(|pool| pool.borrow_mut().get()?.allocate(layout))
    }

    /// Deallocates the block located at `pointer`.
    ///
    /// A block the pool does not recognize as one of its own is deliberately leaked rather
    /// than risk corrupting a free list; debug builds assert on it.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` was returned by `allocate` on this thread, and has not been
    ///     deallocated since.
    /// -   Assumes the memory pointed to by `pointer` is no longer in use.
    pub unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        //  Safety:
        //  -   `pointer` is assumed to be preceded by an intact header.
        let tag = BlockPool::<SystemPlatform>::block_tag(pointer);

        //  Fallback blocks do not need the pool; releasing them keeps working even once the
        //  thread-local has been torn down.
        if tag == StoreTag::SYSTEM {
            //  Safety:
            //  -   `pointer` is assumed to stem from the fallback path on the system heap.
            //  -   The memory is assumed to be no longer in use.
            let released = BlockPool::deallocate_fallback(&SystemPlatform::new(), pointer);

            debug_assert!(released.is_ok(), "invalid fallback block: {:?}", released);

            return;
        }

        POOL.with(|pool| {
            let mut pool = pool.borrow_mut();

            match pool.get() {
                Some(pool) => {
                    //  Safety:
                    //  -   `pointer` is assumed to stem from this thread's pool.
                    //  -   The memory is assumed to be no longer in use.
                    let released = unsafe { pool.deallocate(pointer) };

                    debug_assert!(released.is_ok(), "invalid block: {:?}", released);
                }
                //  No pool was ever built on this thread; the pointer cannot be one of ours.
                None => debug_assert!(false, "pool-tagged block on a thread without a pool"),
            }
        });
    }
}

#[cfg(feature = "allocator-api")]
mod allocator_api {

use core::alloc::{AllocError, Allocator};

use super::*;

//  Safety:
//  -   Blocks remain valid until deallocated, the pool living as long as the thread.
//  -   All instances refer to the calling thread's pool, so moving or cloning the handle does
//      not strand a block; crossing threads is ruled out by `!Send`.
unsafe impl Allocator for PoolAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        PoolAllocator::allocate(self, layout)
            .map(|pointer| NonNull::slice_from_raw_parts(pointer, layout.size()))
            .ok_or(AllocError)
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, _layout: Layout) {
        //  The header stamped at allocation carries everything release needs.
        PoolAllocator::deallocate(self, pointer);
    }
}

} // mod allocator_api

//
//  Implementation
//

thread_local! {
    static POOL: RefCell<Pool> = const { RefCell::new(Pool::Cold) };
}

//  Lazily constructed; a failed construction is remembered, to avoid re-attempting on every
//  allocation.
enum Pool {
    Cold,
    Ready(BlockPool<SystemPlatform>),
    Failed,
}

impl Pool {
    fn get(&mut self) -> Option<&mut BlockPool<SystemPlatform>> {
        if let Pool::Cold = self {
            *self = match BlockPool::new(SystemPlatform::new(), PoolConfig::default()) {
                Ok(pool) => Pool::Ready(pool),
                Err(_) => Pool::Failed,
            };
        }

        match self {
            Pool::Ready(pool) => Some(pool),
            _ => None,
        }
    }
}

// mod tests
