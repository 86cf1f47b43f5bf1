//! Hash-partitioned shard sets.
//!
//! A shard set is a directory of `part-NNNNN.redb` files. Each key lives in
//! exactly one shard, chosen by a [`Partitioner`] from the key's serialized
//! bytes. Readers and writers must agree on the partitioner and shard count.

pub mod config;
pub mod reader;
pub mod shard;
pub mod writer;

// Re-export main types for public API
pub use config::{shard_file_name, PartitionConfig};
pub use reader::PartitionedReader;
pub use shard::{select_shard, HashPartitioner, Partitioner};
pub use writer::PartitionedWriter;
