//! Description of tags and error conditions shared across the pool.

use core::{error, fmt};

pub use core::alloc::Layout;
pub use crate::utils::PowerOf2;

/// StoreTag
///
/// Identifies the owner of a block: one of the pool's stores, or the platform fallback path.
///
/// The tag is stamped into the header of every block at creation, and is what routes a block
/// back to its owner on deallocation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct StoreTag(u32);

impl StoreTag {
    /// Tag stamped on blocks obtained from the platform fallback path.
    pub const SYSTEM: StoreTag = StoreTag(u32::MAX);

    /// Creates a tag with a specific value.
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Returns the underlying value.
    pub const fn value(&self) -> u32 { self.0 }
}

/// StoreError
///
/// The reason a `BlockStore` could not be constructed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StoreError {
    /// The requested block size was 0.
    ZeroBlockSize,
    /// The requested block count was 0.
    ZeroBlockCount,
    /// The requested block count exceeds the representable block index range.
    TooManyBlocks,
    /// The arena spanning all requested blocks does not fit the address space.
    ArenaTooLarge,
    /// The platform could not provide the arena.
    OutOfMemory,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::ZeroBlockSize => "block size must be non-zero",
            Self::ZeroBlockCount => "block count must be non-zero",
            Self::TooManyBlocks => "block count exceeds the block index range",
            Self::ArenaTooLarge => "arena size exceeds the address space",
            Self::OutOfMemory => "the platform could not provide the arena",
        };

        f.write_str(message)
    }
}

impl error::Error for StoreError {}

/// PoolError
///
/// The reason a `BlockPool` could not be constructed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PoolError {
    /// One of the ladder's stores could not be constructed.
    Store(StoreError),
    /// The ladder's block sizes are not strictly increasing once aligned.
    MisorderedLadder,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(error) => write!(f, "could not construct a store: {}", error),
            Self::MisorderedLadder => f.write_str("ladder block sizes must be strictly increasing"),
        }
    }
}

impl error::Error for PoolError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Store(error) => Some(error),
            Self::MisorderedLadder => None,
        }
    }
}

impl From<StoreError> for PoolError {
    fn from(error: StoreError) -> Self { Self::Store(error) }
}

/// DeallocError
///
/// The reason a deallocation was rejected.
///
/// A rejected block is left untouched: the free list is never altered on the strength of a
/// pointer that failed validation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeallocError {
    /// The block does not designate a payload of the store's arena.
    ForeignBlock,
    /// The header preceding the block fails the magic or tag check.
    BadMagic,
    /// The block is not currently allocated; a repeated deallocation, typically.
    NotAllocated,
    /// The tag stamped on the block designates no store of the pool.
    UnknownTag,
}

impl fmt::Display for DeallocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::ForeignBlock => "block does not belong to this store",
            Self::BadMagic => "block header fails the magic or tag check",
            Self::NotAllocated => "block is not currently allocated",
            Self::UnknownTag => "block tag designates no store of this pool",
        };

        f.write_str(message)
    }
}

impl error::Error for DeallocError {}

// mod tests
