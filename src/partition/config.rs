//! Configuration for partitioned shard sets.

use crate::error::PartitionError;
use std::path::{Path, PathBuf};

/// File extension of every shard file.
pub const SHARD_FILE_EXTENSION: &str = "redb";

/// Prefix of every shard file name.
pub const SHARD_FILE_PREFIX: &str = "part-";

/// Configuration for a partitioned shard set.
///
/// The writer that produced a shard set and every reader of it must use the
/// same shard count and partitioner. Nothing in the files records either, so
/// a mismatch shows up only as keys that are never found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    /// Number of shards keys are distributed across.
    ///
    /// Must be between 1 and 65535.
    pub shard_count: u16,
}

impl PartitionConfig {
    /// Creates a validated configuration.
    ///
    /// # Arguments
    /// * `shard_count` - Number of shards (1-65535)
    pub fn new(shard_count: u16) -> Result<Self, PartitionError> {
        if shard_count == 0 {
            return Err(PartitionError::InvalidShardCount(shard_count));
        }
        Ok(Self { shard_count })
    }

    /// Checks that `shard` is a valid ordinal for this configuration.
    pub fn validate_shard(&self, shard: u16) -> Result<u16, PartitionError> {
        if shard >= self.shard_count {
            return Err(PartitionError::ShardOutOfRange {
                shard,
                shard_count: self.shard_count,
            });
        }
        Ok(shard)
    }

    /// Path of shard `ordinal` inside `location`.
    pub fn shard_path(&self, location: &Path, ordinal: u16) -> PathBuf {
        location.join(shard_file_name(ordinal))
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self { shard_count: 16 }
    }
}

/// File name of shard `ordinal`, e.g. `part-00003.redb`.
pub fn shard_file_name(ordinal: u16) -> String {
    format!(
        "{}{:05}.{}",
        SHARD_FILE_PREFIX, ordinal, SHARD_FILE_EXTENSION
    )
}

/// Parses the ordinal out of a shard file name.
pub fn parse_shard_file_name(name: &str) -> Option<u16> {
    let digits = name
        .strip_prefix(SHARD_FILE_PREFIX)?
        .strip_suffix(SHARD_FILE_EXTENSION)?
        .strip_suffix('.')?;
    if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
