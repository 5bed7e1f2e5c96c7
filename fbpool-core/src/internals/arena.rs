//! Arena
//!
//! One contiguous allocation subdivided into `block_count` strides of `BlockHeader::SIZE +
//! block_size` bytes each: the header first, the payload right behind it.
//!
//! Blocks are addressed by index. A payload pointer maps back to an index by range and stride
//! arithmetic, never by trusting memory behind the pointer: a pointer the arena does not span
//! is rejected before any header is read.

use core::{alloc::Layout, mem, ptr::NonNull};

use crate::utils::{self, PowerOf2};

use super::header::BlockHeader;

/// The backing memory of one store.
pub(crate) struct Arena {
    buffer: NonNull<u8>,
    block_size: usize,
    block_count: usize,
}

impl Arena {
    /// Returns the layout of an arena, or None on arithmetic overflow.
    pub(crate) fn layout_of(block_size: usize, block_count: usize) -> Option<Layout> {
        let stride = BlockHeader::SIZE.checked_add(block_size)?;
        let size = stride.checked_mul(block_count)?;

        Layout::from_size_align(size, mem::align_of::<BlockHeader>()).ok()
    }

    /// Adopts a buffer obtained with `layout_of(block_size, block_count)`.
    ///
    /// The headers are uninitialized until written with `write_header`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `buffer` spans at least `layout_of(block_size, block_count)` bytes.
    /// -   Assumes that `buffer` is aligned for `BlockHeader`.
    /// -   Assumes exclusive access to the buffer.
    pub(crate) unsafe fn from_raw(buffer: NonNull<u8>, block_size: usize, block_count: usize) -> Self {
        debug_assert!(utils::is_sufficiently_aligned_for(buffer, PowerOf2::align_of::<BlockHeader>()));

        Self { buffer, block_size, block_count, }
    }

    /// Returns the block size.
    pub(crate) fn block_size(&self) -> usize { self.block_size }

    /// Returns the block count.
    pub(crate) fn block_count(&self) -> usize { self.block_count }

    /// Returns the buffer originally adopted, for release.
    pub(crate) fn as_raw(&self) -> NonNull<u8> { self.buffer }

    /// Returns the layout of the buffer originally adopted.
    pub(crate) fn layout(&self) -> Layout {
        //  Safety:
        //  -   `layout_of` succeeded with these values at construction.
        unsafe {
            Layout::from_size_align_unchecked(
                (BlockHeader::SIZE + self.block_size) * self.block_count,
                mem::align_of::<BlockHeader>(),
            )
        }
    }

    /// Writes the header of the block at `index`, initializing that memory.
    pub(crate) fn write_header(&mut self, index: i32, header: BlockHeader) {
        //  Safety:
        //  -   In-bounds, as per the debug assertion in `header_ptr`.
        unsafe { self.header_ptr(index).write(header) }
    }

    /// Returns the header of the block at `index`.
    ///
    /// The header must have been written beforehand.
    pub(crate) fn header(&self, index: i32) -> &BlockHeader {
        //  Safety:
        //  -   In-bounds, and initialized by the owning store.
        //  -   Borrow bounded by `self`; headers never overlap payloads.
        unsafe { &*self.header_ptr_const(index) }
    }

    /// Returns the header of the block at `index`, mutably.
    ///
    /// The header must have been written beforehand.
    pub(crate) fn header_mut(&mut self, index: i32) -> &mut BlockHeader {
        //  Safety:
        //  -   In-bounds, and initialized by the owning store.
        //  -   Borrow bounded by `self`; headers never overlap payloads.
        unsafe { &mut *self.header_ptr(index) }
    }

    /// Returns the payload of the block at `index`.
    pub(crate) fn payload(&self, index: i32) -> NonNull<u8> {
        let offset = self.offset_of(index) + BlockHeader::SIZE;

        //  Safety:
        //  -   In-bounds, as per the debug assertion in `offset_of`.
        unsafe { NonNull::new_unchecked(self.buffer.as_ptr().add(offset)) }
    }

    /// Maps a payload pointer back to its block index.
    ///
    /// Returns None if the pointer does not designate a payload of this arena.
    pub(crate) fn index_of(&self, payload: NonNull<u8>) -> Option<i32> {
        let base = self.buffer.as_ptr() as usize;
        let address = payload.as_ptr() as usize;

        let offset = address.checked_sub(base)?;

        if offset >= self.stride() * self.block_count {
            return None;
        }

        if offset % self.stride() != BlockHeader::SIZE {
            return None;
        }

        Some((offset / self.stride()) as i32)
    }

    fn stride(&self) -> usize { BlockHeader::SIZE + self.block_size }

    fn offset_of(&self, index: i32) -> usize {
        debug_assert!(0 <= index && (index as usize) < self.block_count);

        index as usize * self.stride()
    }

    fn header_ptr(&mut self, index: i32) -> *mut BlockHeader {
        let offset = self.offset_of(index);

        //  Safety:
        //  -   In-bounds, as per the debug assertion in `offset_of`.
        unsafe { self.buffer.as_ptr().add(offset) as *mut BlockHeader }
    }

    fn header_ptr_const(&self, index: i32) -> *const BlockHeader {
        let offset = self.offset_of(index);

        //  Safety:
        //  -   In-bounds, as per the debug assertion in `offset_of`.
        unsafe { self.buffer.as_ptr().add(offset) as *const BlockHeader }
    }
}

// mod tests
