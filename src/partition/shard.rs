//! Shard selection logic for partitioned storage.
//!
//! Provides deterministic shard selection so a key always maps to the same
//! shard across processes and runs.

use super::config::PartitionConfig;
use crate::error::PartitionError;
use xxhash_rust::xxh3::xxh3_64;

/// Maps serialized key bytes to a shard ordinal.
///
/// Implementations must be pure functions of their inputs: the shard set
/// writer and every reader have to agree on every key.
pub trait Partitioner {
    /// Returns a shard in `[0, shard_count)`. `shard_count` is never zero.
    fn partition(&self, key_bytes: &[u8], shard_count: u16) -> u16;
}

/// Default partitioner: xxh3 of the serialized key, modulo the shard count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&self, key_bytes: &[u8], shard_count: u16) -> u16 {
        (xxh3_64(key_bytes) % shard_count as u64) as u16
    }
}

impl<P: Partitioner + ?Sized> Partitioner for Box<P> {
    fn partition(&self, key_bytes: &[u8], shard_count: u16) -> u16 {
        (**self).partition(key_bytes, shard_count)
    }
}

/// Selects a shard for the given serialized key.
///
/// Guards against a zero shard count and against partitioners returning an
/// ordinal out of range.
///
/// # Arguments
/// * `partitioner` - The partition function
/// * `key_bytes` - The serialized key
/// * `config` - Partition configuration holding the shard count
///
/// # Returns
/// Shard index in range [0, shard_count)
pub fn select_shard<P: Partitioner + ?Sized>(
    partitioner: &P,
    key_bytes: &[u8],
    config: &PartitionConfig,
) -> Result<u16, PartitionError> {
    if config.shard_count == 0 {
        return Err(PartitionError::InvalidShardCount(config.shard_count));
    }

    config.validate_shard(partitioner.partition(key_bytes, config.shard_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(shard_count: u16) -> PartitionConfig {
        PartitionConfig { shard_count }
    }

    struct Fixed(u16);

    impl Partitioner for Fixed {
        fn partition(&self, _key_bytes: &[u8], _shard_count: u16) -> u16 {
            self.0
        }
    }

    #[test]
    fn test_shard_selection_deterministic() {
        let key = b"test_key";
        let shard1 = select_shard(&HashPartitioner, key, &config(16)).unwrap();
        let shard2 = select_shard(&HashPartitioner, key, &config(16)).unwrap();
        assert_eq!(shard1, shard2);
        assert_eq!(shard1, (xxh3_64(key) % 16) as u16);
    }

    #[test]
    fn test_shard_selection_distribution() {
        let shard_count = 16;

        let mut shards = std::collections::HashSet::new();
        for i in 0..100u32 {
            let shard =
                select_shard(&HashPartitioner, &i.to_be_bytes(), &config(shard_count)).unwrap();
            shards.insert(shard);
        }

        assert!(shards.len() > 1);
        assert!(shards.len() <= shard_count as usize);
    }

    #[test]
    fn test_single_shard() {
        for key in [&b"a"[..], b"b", b""] {
            assert_eq!(select_shard(&HashPartitioner, key, &config(1)).unwrap(), 0);
        }
    }

    #[test]
    fn test_invalid_shard_count() {
        let result = select_shard(&HashPartitioner, b"test_key", &config(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_partitioner() {
        let result = select_shard(&Fixed(4), b"key", &config(4));
        assert!(matches!(
            result,
            Err(PartitionError::ShardOutOfRange { shard: 4, shard_count: 4 })
        ));
        assert_eq!(select_shard(&Fixed(3), b"key", &config(4)).unwrap(), 3);
    }

    #[test]
    fn test_boxed_partitioner() {
        let boxed: Box<dyn Partitioner> = Box::new(Fixed(1));
        assert_eq!(select_shard(&boxed, b"key", &config(2)).unwrap(), 1);
    }
}
