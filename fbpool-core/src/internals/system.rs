//! The fallback path.
//!
//! Requests no bucket can serve, whether oversized, over-aligned, or arriving while the fitting
//! bucket is exhausted, are satisfied straight from the platform.
//!
//! The platform wants the original layout back on release, and release only receives a pointer.
//! The header stamped in front of the payload records what is needed to rebuild the layout, the
//! role a side table plays in allocators that keep their headers out of band.

use core::{alloc::Layout, cmp, mem, ptr::NonNull};

use crate::{DeallocError, Platform, StoreTag};

use super::header::{BlockHeader, MAGIC};

/// Allocates a block straight from the platform.
///
/// The payload honors `layout.size()` and `layout.align()`, alignments beyond the block
/// granularity included, and is preceded by a `SYSTEM`-tagged header.
pub(crate) fn allocate<P>(platform: &P, layout: Layout) -> Option<NonNull<u8>>
    where
        P: Platform
{
    //  The payload offset doubles as the allocation alignment: it is a power of 2, at least
    //  `BlockHeader::SIZE`, hence the header lands in-bounds, 64-byte aligned, at `offset - 64`.
    let offset = cmp::max(BlockHeader::SIZE, layout.align());

    let size = offset.checked_add(layout.size())?;

    let full_layout = Layout::from_size_align(size, offset).ok()?;

    //  Safety:
    //  -   `full_layout` has a non-zero size, `offset` being non-zero.
    let base = unsafe { platform.allocate(full_layout)? };

    //  Safety:
    //  -   `offset` is less than or equal to the allocated size.
    let payload = unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) };

    let header = BlockHeader::fallback_block(layout.size(), offset);

    //  Safety:
    //  -   `payload - SIZE` is within the allocation, as `offset >= SIZE`.
    //  -   The location is aligned for `BlockHeader`.
    unsafe { header_of(payload).as_ptr().write(header) };

    Some(payload)
}

/// Releases a block obtained from `allocate`.
///
/// Returns an error, releasing nothing, if the header in front of the payload fails validation.
///
/// #   Safety
///
/// -   Assumes that `block` was returned by `allocate` on the same platform, with its header
///     still intact, and has not been released since.
/// -   Assumes that the memory is no longer in use.
pub(crate) unsafe fn deallocate<P>(platform: &P, block: NonNull<u8>) -> Result<(), DeallocError>
    where
        P: Platform
{
    //  Safety:
    //  -   `block` is assumed to be preceded by an intact header.
    let header = header_of(block);
    let header = header.as_ref();

    if header.magic != MAGIC || header.tag() != StoreTag::SYSTEM {
        return Err(DeallocError::ForeignBlock);
    }

    let offset = header.payload_offset;
    let size = header.payload_size;

    //  Safety:
    //  -   `offset` and `offset + size` were accepted by `Layout::from_size_align` at allocation.
    let layout = Layout::from_size_align_unchecked(offset + size, offset);

    //  Safety:
    //  -   The allocation starts `offset` bytes before the payload.
    let base = NonNull::new_unchecked(block.as_ptr().sub(offset));

    //  Safety:
    //  -   `base` was returned by `platform.allocate` with `layout`.
    platform.deallocate(base, layout);

    Ok(())
}

/// Returns the header preceding a payload.
///
/// This is the one place a header is located relative to a pointer rather than by index; every
/// caller funnels through the safety contract below.
///
/// #   Safety
///
/// -   Assumes that `block` is a payload handed out by a store or by `allocate`, with its
///     header still intact in front of it.
pub(crate) unsafe fn header_of(block: NonNull<u8>) -> NonNull<BlockHeader> {
    debug_assert!(block.as_ptr() as usize >= BlockHeader::SIZE);

    //  Safety:
    //  -   A header precedes every payload, as per this function's own contract.
    NonNull::new_unchecked(block.as_ptr().sub(BlockHeader::SIZE) as *mut BlockHeader)
}

//  Guards the `offset - 64` header placement.
const _: () = assert!(BlockHeader::SIZE == mem::align_of::<BlockHeader>());

// mod tests
