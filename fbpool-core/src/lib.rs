#![no_std]

#![deny(missing_docs)]

//! Building blocks for a fixed-size block memory pool.
//!
//! fbpool-core contains the platform-independent machinery of the pool:
//! -   A platform trait, used to obtain raw arenas of memory to be carved up into blocks.
//! -   `BlockStore`, a slab of identically sized blocks threaded on an intrusive free list.
//! -   `BlockPool`, a ladder of stores of increasing block sizes with a platform fallback for
//!     requests no store can serve.

mod api;
mod internals;
mod utils;

pub use api::*;
