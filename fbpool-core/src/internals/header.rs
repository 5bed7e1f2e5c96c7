//! Block headers.
//!
//! Every block handed out by the pool, store-carved and platform-allocated alike, is preceded
//! by one `BlockHeader`. Whilst a block is allocated its header is quiescent; whilst free, the
//! owning store reuses the header as the free-list link.

use core::mem;

use crate::StoreTag;

/// Sentinel written into every header at block creation.
pub(crate) const MAGIC: u32 = 0xB10C_CAFE;

/// Index terminating a free list; also the free head of an exhausted store.
pub(crate) const NO_BLOCK: i32 = -1;

//  Block life cycle, recorded for double-free detection.
//
//  Stored raw rather than as an enum: a header read back from a corrupted block may carry any
//  bit pattern, and must be comparable without first being a valid enum value.
pub(crate) const STATE_FREE: u32 = 1;
pub(crate) const STATE_ALLOCATED: u32 = 2;

/// BlockHeader
///
/// The bookkeeping record preceding every payload.
///
/// The size is pinned to 64 bytes, so that payloads inherit 64-byte alignment from a 64-byte
/// aligned arena.
#[repr(C, align(64))]
pub(crate) struct BlockHeader {
    /// Validates the provenance of pointers handed back for deallocation.
    pub(crate) magic: u32,
    /// Raw value of the owning `StoreTag`.
    pub(crate) user_tag: u32,
    /// The block's own index within its store; `NO_BLOCK` for fallback blocks.
    pub(crate) block_idx: i32,
    /// Index of the next free block; `NO_BLOCK` terminates the list. Meaningless whilst allocated.
    pub(crate) next: i32,
    /// One of the `STATE_*` constants.
    pub(crate) state: u32,
    /// Payload bytes usable by the caller.
    pub(crate) payload_size: usize,
    /// Offset from the block's backing region to the payload.
    pub(crate) payload_offset: usize,
}

impl BlockHeader {
    /// Size of a header; also the distance from a header to its payload.
    pub(crate) const SIZE: usize = mem::size_of::<BlockHeader>();

    /// Creates the header of a free store block.
    pub(crate) fn store_block(tag: StoreTag, index: i32, next: i32, payload_size: usize) -> Self {
        Self {
            magic: MAGIC,
            user_tag: tag.value(),
            block_idx: index,
            next,
            state: STATE_FREE,
            payload_size,
            payload_offset: Self::SIZE,
        }
    }

    /// Creates the header of an allocated fallback block.
    pub(crate) fn fallback_block(payload_size: usize, payload_offset: usize) -> Self {
        Self {
            magic: MAGIC,
            user_tag: StoreTag::SYSTEM.value(),
            block_idx: NO_BLOCK,
            next: NO_BLOCK,
            state: STATE_ALLOCATED,
            payload_size,
            payload_offset,
        }
    }

    /// Returns the owning tag.
    pub(crate) fn tag(&self) -> StoreTag { StoreTag::new(self.user_tag) }
}

//  The payload alignment guarantee hinges on both.
const _: () = assert!(mem::size_of::<BlockHeader>() == 64);
const _: () = assert!(mem::align_of::<BlockHeader>() == 64);

// mod tests
