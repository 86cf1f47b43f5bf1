//! Self-describing heterogeneous maps and partitioned point lookups over
//! sorted, immutable redb shards.
//!
//! - [`value`]: the per-element serialization contract and built-in types
//! - [`polymap`]: [`PolymorphicMap`] and its per-map [`TypeRegistry`]
//! - [`store`]: single shard files, read through [`ShardStore`]
//! - [`partition`]: shard sets, read through [`PartitionedReader`]

pub mod encoding;
pub mod error;
pub mod partition;
pub mod polymap;
pub mod store;
pub mod value;

// Re-export common types for convenience
pub use error::{Error, Result};
pub use partition::{HashPartitioner, PartitionConfig, PartitionedReader, PartitionedWriter, Partitioner};
pub use polymap::{PolymorphicMap, TypeRegistry};
pub use store::{Record, ShardBuilder, ShardStore};
pub use value::{TypeCatalog, Value, WireValue};
