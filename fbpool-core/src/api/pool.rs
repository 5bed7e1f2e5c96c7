//! BlockPool
//!
//! A pool owns a ladder of stores of strictly increasing block sizes, and routes each request
//! to the smallest bucket able to serve it. Requests no bucket fits, and requests arriving
//! while the fitting bucket is exhausted, go straight to the platform instead, stamped with the
//! `SYSTEM` tag so that release can tell the two populations apart.
//!
//! A pool is an ordinary owned value: callers decide where it lives. The `fbpool` crate gives
//! each thread one pool of its own, which keeps the hot path free of synchronization.

use core::{alloc::Layout, ptr::NonNull};

use crate::internals::system;

use super::{
    BLOCK_ALIGNMENT, BlockStore, BucketConfig, DeallocError, MAX_STORE,
    Platform, PoolConfig, PoolError, StoreTag,
};

//  Tag of the ladder's first store; store `i` is tagged `BASE_TAG + i`.
const BASE_TAG: StoreTag = StoreTag::new(0xFB00);

/// BlockPool
///
/// A ladder of `MAX_STORE` stores, plus the platform fallback path.
pub struct BlockPool<P>
    where
        P: Platform
{
    stores: [BlockStore<P>; MAX_STORE],
    platform: P,
}

impl<P> BlockPool<P>
    where
        P: Platform + Clone
{
    /// Creates a pool from a ladder configuration.
    ///
    /// Either every store of the ladder is constructed, or the first failure is returned and
    /// the stores already built are released again.
    pub fn new(platform: P, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let [b0, b1, b2, b3, b4] = config.buckets;

        let stores = [
            Self::store(&platform, 0, b0)?,
            Self::store(&platform, 1, b1)?,
            Self::store(&platform, 2, b2)?,
            Self::store(&platform, 3, b3)?,
            Self::store(&platform, 4, b4)?,
        ];

        Ok(Self { stores, platform, })
    }

    fn store(platform: &P, index: usize, bucket: BucketConfig) -> Result<BlockStore<P>, PoolError> {
        let tag = StoreTag::new(BASE_TAG.value() + index as u32);

        Ok(BlockStore::new(platform.clone(), tag, bucket.block_size, bucket.block_count)?)
    }
}

impl<P> BlockPool<P>
    where
        P: Platform
{
    /// Allocates a block satisfying `layout`.
    ///
    /// Bucket-served when a bucket fits and has a free block, platform-served otherwise; None
    /// only when the platform itself cannot serve the fallback.
    ///
    /// Any block returned is preceded by a valid header carrying an identifiable tag.
    pub fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        if let Some(store) = self.store_for(layout) {
            if let Some(block) = store.allocate() {
                return Some(block);
            }
        }

        Self::allocate_fallback(&self.platform, layout)
    }

    /// Releases a block obtained from `allocate`.
    ///
    /// The tag stamped on the block routes it back to its store, or to the platform for
    /// fallback blocks; the owner then validates the block before touching any free list.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` was returned by `allocate` on this pool, or by
    ///     `allocate_fallback` on the same platform, and has not been released since.
    /// -   Assumes that the memory is no longer in use.
    pub unsafe fn deallocate(&mut self, block: NonNull<u8>) -> Result<(), DeallocError> {
        //  Safety:
        //  -   `block` is assumed to be preceded by an intact header.
        let tag = Self::block_tag(block);

        if tag == StoreTag::SYSTEM {
            //  Safety:
            //  -   `block` is assumed to stem from the fallback path of this platform.
            //  -   The memory is assumed to be no longer in use.
            return Self::deallocate_fallback(&self.platform, block);
        }

        let index = tag.value().wrapping_sub(BASE_TAG.value()) as usize;

        let store = self.stores.get_mut(index).ok_or(DeallocError::UnknownTag)?;

        store.deallocate(block)
    }

    /// Allocates from the platform directly, bypassing the buckets.
    ///
    /// The block carries the `SYSTEM` tag, and is released by `deallocate` and
    /// `deallocate_fallback` alike.
    pub fn allocate_fallback(platform: &P, layout: Layout) -> Option<NonNull<u8>> {
        system::allocate(platform, layout)
    }

    /// Releases a block obtained from the fallback path.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` was returned by `allocate_fallback` (or by `allocate` falling
    ///     back) on the same platform, and has not been released since.
    /// -   Assumes that the memory is no longer in use.
    pub unsafe fn deallocate_fallback(platform: &P, block: NonNull<u8>) -> Result<(), DeallocError> {
        system::deallocate(platform, block)
    }

    /// Reads the tag stamped on a block at allocation.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` was returned by a pool or store allocation, with its header
    ///     still intact in front of the payload.
    pub unsafe fn block_tag(block: NonNull<u8>) -> StoreTag {
        //  Safety:
        //  -   `block` is assumed to be preceded by an intact header.
        system::header_of(block).as_ref().tag()
    }

    /// Returns the ladder, smallest block size first.
    pub fn stores(&self) -> &[BlockStore<P>] { &self.stores }

    /// Returns a reference to the platform.
    pub fn platform(&self) -> &P { &self.platform }

    //  Returns the smallest bucket able to serve `layout`, if any.
    //
    //  A zero size is platform business, per malloc semantics; alignments beyond the block
    //  granularity only the fallback path honors.
    fn store_for(&mut self, layout: Layout) -> Option<&mut BlockStore<P>> {
        if layout.size() == 0 || layout.align() > BLOCK_ALIGNMENT.value() {
            return None;
        }

        self.stores.iter_mut().find(|store| store.block_size() >= layout.size())
    }
}

#[cfg(test)]
mod tests {

use crate::StoreError;
use crate::internals::test::TestPlatform;

use super::*;

type TestPool<'a> = BlockPool<&'a TestPlatform>;

//  A ladder small enough for the TestPlatform's backing buffer.
fn small_config() -> PoolConfig {
    PoolConfig {
        buckets: [
            BucketConfig::new(64, 4),
            BucketConfig::new(128, 4),
            BucketConfig::new(192, 2),
            BucketConfig::new(256, 2),
            BucketConfig::new(320, 2),
        ],
    }
}

fn pool(platform: &TestPlatform) -> TestPool<'_> {
    BlockPool::new(platform, small_config()).expect("Constructed")
}

fn layout(size: usize) -> Layout { Layout::from_size_align(size, 8).expect("Valid layout") }

#[test]
fn pool_new_builds_the_whole_ladder() {
    let platform = TestPlatform::new();

    let pool = pool(&platform);

    let sizes: [usize; MAX_STORE] = [64, 128, 192, 256, 320];

    assert_eq!(MAX_STORE, pool.stores().len());

    for (store, size) in pool.stores().iter().zip(&sizes) {
        assert_eq!(*size, store.block_size());
    }

    //  One arena per store, nothing else.
    assert_eq!(MAX_STORE, platform.allocated());
}

#[test]
fn pool_new_assigns_consecutive_tags() {
    let platform = TestPlatform::new();

    let pool = pool(&platform);

    for (index, store) in pool.stores().iter().enumerate() {
        assert_eq!(BASE_TAG.value() + index as u32, store.tag().value());
        assert_ne!(StoreTag::SYSTEM, store.tag());
    }
}

#[test]
fn pool_new_rejects_misordered_ladder() {
    let platform = TestPlatform::new();

    let mut config = small_config();
    config.buckets.swap(0, 4);

    let result = BlockPool::new(&platform, config).map(drop);

    assert_eq!(Err(PoolError::MisorderedLadder), result);
    assert_eq!(0, platform.allocated());
}

#[test]
fn pool_new_rolls_back_on_partial_failure() {
    let platform = TestPlatform::new();

    //  The third store's arena request fails.
    platform.fail_after(2);

    let result = BlockPool::new(&platform, small_config()).map(drop);

    assert_eq!(Err(PoolError::Store(StoreError::OutOfMemory)), result);

    //  Both stores built before the failure released their arenas again.
    assert_eq!(2, platform.allocated());
    assert_eq!(2, platform.deallocated());
}

#[test]
fn pool_allocate_routes_to_smallest_fitting_bucket() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let expectations = [(1, 0), (64, 0), (65, 1), (128, 1), (129, 2), (200, 3), (320, 4)];

    for (size, bucket) in expectations {
        let block = pool.allocate(layout(size)).expect("Allocated");

        assert!(pool.stores()[bucket].contains(block), "size {} routed away from bucket {}", size, bucket);

        //  Safety:
        //  -   `block` was just allocated.
        unsafe { pool.deallocate(block).expect("Released") };
    }
}

#[test]
fn pool_block_tags_identify_their_store() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let sizes = [64, 128, 192, 256, 320];

    for (index, size) in sizes.into_iter().enumerate() {
        let block = pool.allocate(layout(size)).expect("Allocated");

        //  Safety:
        //  -   `block` was just allocated.
        let tag = unsafe { TestPool::block_tag(block) };

        assert_eq!(pool.stores()[index].tag(), tag);

        //  No other store claims the block.
        for (other, store) in pool.stores().iter().enumerate() {
            assert_eq!(other == index, store.contains(block));
            assert_eq!(other == index, store.tag() == tag);
        }

        //  Safety:
        //  -   `block` was just allocated.
        unsafe { pool.deallocate(block).expect("Released") };
    }
}

#[test]
fn pool_allocate_oversized_falls_back() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let block = pool.allocate(layout(321)).expect("Allocated");

    //  Safety:
    //  -   `block` was just allocated.
    let tag = unsafe { TestPool::block_tag(block) };

    assert_eq!(StoreTag::SYSTEM, tag);

    for store in pool.stores() {
        assert!(!store.contains(block));
    }

    //  Safety:
    //  -   `block` was just allocated.
    unsafe { pool.deallocate(block).expect("Released") };
}

#[test]
fn pool_allocate_over_aligned_falls_back() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let over_aligned = Layout::from_size_align(64, 128).expect("Valid layout");

    let block = pool.allocate(over_aligned).expect("Allocated");

    assert_eq!(0, block.as_ptr() as usize % 128);

    //  Safety:
    //  -   `block` was just allocated.
    assert_eq!(StoreTag::SYSTEM, unsafe { TestPool::block_tag(block) });

    //  Safety:
    //  -   `block` was just allocated.
    unsafe { pool.deallocate(block).expect("Released") };
}

#[test]
fn pool_allocate_zero_size_falls_back() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let block = pool.allocate(layout(0)).expect("Allocated");

    //  Safety:
    //  -   `block` was just allocated.
    assert_eq!(StoreTag::SYSTEM, unsafe { TestPool::block_tag(block) });

    //  Safety:
    //  -   `block` was just allocated.
    unsafe { pool.deallocate(block).expect("Released") };
}

#[test]
fn pool_allocate_exhausted_bucket_falls_back() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    //  Drain the 2-block 192-byte bucket.
    let first = pool.allocate(layout(192)).expect("Allocated");
    let second = pool.allocate(layout(192)).expect("Allocated");

    let third = pool.allocate(layout(192)).expect("Allocated");

    //  Safety:
    //  -   `third` was just allocated.
    assert_eq!(StoreTag::SYSTEM, unsafe { TestPool::block_tag(third) });

    //  Safety:
    //  -   All three blocks were just allocated.
    unsafe {
        pool.deallocate(third).expect("Released");
        pool.deallocate(second).expect("Released");
        pool.deallocate(first).expect("Released");
    }

    //  With the bucket refilled, the next request is bucket-served again.
    let block = pool.allocate(layout(192)).expect("Allocated");

    assert!(pool.stores()[2].contains(block));

    //  Safety:
    //  -   `block` was just allocated.
    unsafe { pool.deallocate(block).expect("Released") };
}

#[test]
fn pool_deallocate_routes_by_tag() {
    let platform = TestPlatform::new();

    let mut pool = pool(&platform);

    let small = pool.allocate(layout(64)).expect("Allocated");
    let large = pool.allocate(layout(256)).expect("Allocated");

    //  Safety:
    //  -   Both blocks were just allocated.
    unsafe {
        pool.deallocate(small).expect("Released");
        pool.deallocate(large).expect("Released");
    }

    //  LIFO: each bucket hands the released block right back.
    assert_eq!(Some(small), pool.allocate(layout(64)));
    assert_eq!(Some(large), pool.allocate(layout(256)));
}

#[test]
fn pool_deallocate_rejects_cross_pool_blocks() {
    let platform = TestPlatform::new();

    let mut first = pool(&platform);
    let mut second = pool(&platform);

    let block = first.allocate(layout(64)).expect("Allocated");

    //  The tag matches a store of `second`, the arena does not.
    //
    //  Safety:
    //  -   `block` carries an intact header.
    let result = unsafe { second.deallocate(block) };

    assert_eq!(Err(DeallocError::ForeignBlock), result);

    //  Safety:
    //  -   `block` was just allocated from `first`.
    unsafe { first.deallocate(block).expect("Released") };
}

#[test]
fn pool_drop_releases_every_arena() {
    let platform = TestPlatform::new();

    {
        let mut pool = pool(&platform);
        let _ = pool.allocate(layout(64));
    }

    assert_eq!(platform.allocated(), platform.deallocated());
}

} // mod tests
