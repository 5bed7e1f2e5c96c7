//! The configuration of a pool's ladder of stores.
//!
//! The ladder is a plain value, so hosts and tests can shrink or reshape the buckets without
//! recompiling. The default geometry is five buckets from 64 bytes to 16 KiB, in steps of 4.

use crate::utils::PowerOf2;

use super::PoolError;

/// Number of stores in a pool's ladder.
pub const MAX_STORE: usize = 5;

/// Granularity of block sizes; requested block sizes round up to a multiple of this.
//  Safety:
//  -   64 is a power of 2.
pub const BLOCK_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(64) };

/// BucketConfig
///
/// Size and capacity of one store of the ladder.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BucketConfig {
    /// Requested block size, in bytes; rounded up to a multiple of `BLOCK_ALIGNMENT`.
    pub block_size: usize,
    /// Number of blocks carved out of the store's arena.
    pub block_count: usize,
}

impl BucketConfig {
    /// Creates a bucket configuration.
    pub const fn new(block_size: usize, block_count: usize) -> Self {
        Self { block_size, block_count, }
    }
}

/// PoolConfig
///
/// The full ladder of a pool, ordered by strictly increasing block size.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PoolConfig {
    /// The buckets, smallest block size first.
    pub buckets: [BucketConfig; MAX_STORE],
}

impl PoolConfig {
    /// Checks that the aligned block sizes of the ladder are strictly increasing.
    ///
    /// Buckets of distinct requested sizes may collapse onto the same aligned size; such a
    /// ladder is rejected, as the duplicated bucket could never be selected.
    pub fn validate(&self) -> Result<(), PoolError> {
        let mut previous = 0;

        for bucket in &self.buckets {
            let aligned = BLOCK_ALIGNMENT.checked_round_up(bucket.block_size)
                .ok_or(PoolError::MisorderedLadder)?;

            if aligned <= previous {
                return Err(PoolError::MisorderedLadder);
            }

            previous = aligned;
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buckets: [
                BucketConfig::new(64, 1024),
                BucketConfig::new(256, 256),
                BucketConfig::new(1024, 128),
                BucketConfig::new(4096, 64),
                BucketConfig::new(16384, 64),
            ],
        }
    }
}

#[cfg(test)]
mod tests {

use super::*;

#[test]
fn pool_config_default_geometry() {
    let config = PoolConfig::default();

    let sizes = [64, 256, 1024, 4096, 16384];
    let counts = [1024, 256, 128, 64, 64];

    for (bucket, (size, count)) in config.buckets.iter().zip(sizes.iter().zip(counts.iter())) {
        assert_eq!(*size, bucket.block_size);
        assert_eq!(*count, bucket.block_count);
    }

    assert!(config.validate().is_ok());
}

#[test]
fn pool_config_validate_rejects_misordered() {
    let mut config = PoolConfig::default();
    config.buckets.swap(1, 2);

    assert_eq!(Err(PoolError::MisorderedLadder), config.validate());
}

#[test]
fn pool_config_validate_rejects_aliased_sizes() {
    //  60 and 64 both round up to 64 bytes.
    let config = PoolConfig {
        buckets: [
            BucketConfig::new(60, 8),
            BucketConfig::new(64, 8),
            BucketConfig::new(128, 8),
            BucketConfig::new(192, 8),
            BucketConfig::new(256, 8),
        ],
    };

    assert_eq!(Err(PoolError::MisorderedLadder), config.validate());
}

#[test]
fn pool_config_validate_accepts_unaligned_requests() {
    let config = PoolConfig {
        buckets: [
            BucketConfig::new(1, 8),
            BucketConfig::new(65, 8),
            BucketConfig::new(129, 8),
            BucketConfig::new(193, 8),
            BucketConfig::new(257, 8),
        ],
    };

    assert!(config.validate().is_ok());
}

} // mod tests
