#![cfg_attr(feature = "allocator-api", feature(allocator_api))]
#![deny(missing_docs)]

//! A fixed-size block memory pool.
//!
//! The type `PoolAllocator` hands out blocks from a ladder of fixed-size stores owned by the
//! calling thread, falling back to the system heap for any request the ladder cannot serve.
//! The pool spares the general-purpose heap on the hot path of callers making many short-lived,
//! small allocations, such as per-call scratch buffers.
//!
//! #   Warning
//!
//! Blocks are owned by the thread that allocated them: they must be released on that same
//! thread, before it exits. `PoolAllocator` is neither `Send` nor `Sync` for this reason.

mod allocator;
mod platform;

pub use allocator::PoolAllocator;
pub use platform::SystemPlatform;

pub use fbpool_core::{
    BlockPool, BlockStore, BucketConfig, DeallocError, Platform, PoolConfig, PoolError,
    StoreError, StoreTag, MAX_STORE,
};
