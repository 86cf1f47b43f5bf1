//! Point lookups across a partitioned shard set.

use super::config::{parse_shard_file_name, PartitionConfig};
use super::shard::{select_shard, HashPartitioner, Partitioner};
use crate::error::{PartitionError, Result};
use crate::store::{Record, ShardStore};
use crate::value::{TypeCatalog, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read handle on every shard of a shard set.
///
/// A lookup hashes the key once, picks exactly one shard and searches only
/// that shard. The reader owns its shard handles; independent readers over
/// the same immutable files need no coordination.
pub struct PartitionedReader<P: Partitioner = HashPartitioner> {
    location: PathBuf,
    config: PartitionConfig,
    partitioner: P,
    shards: Vec<ShardStore>,
}

impl PartitionedReader<HashPartitioner> {
    /// Opens `shard_count` shards under `location` with the default
    /// partitioner and the built-in types.
    pub fn open(location: impl AsRef<Path>, shard_count: u16) -> Result<Self> {
        let config = PartitionConfig::new(shard_count)?;
        Self::open_with(
            location,
            config,
            HashPartitioner,
            TypeCatalog::shared_builtin(),
        )
    }

    /// Opens every shard found under `location`.
    ///
    /// The shard count is taken from the highest shard file ordinal, so a
    /// gap in the numbering fails the open like any other missing shard.
    pub fn open_dir(location: impl AsRef<Path>) -> Result<Self> {
        let shard_count = discover_shard_count(location.as_ref())?;
        Self::open(location, shard_count)
    }
}

impl<P: Partitioner> PartitionedReader<P> {
    /// Opens the shard set with an explicit configuration.
    ///
    /// All shards open or none do: on the first failure every handle opened
    /// so far is released before the error is returned.
    pub fn open_with(
        location: impl AsRef<Path>,
        config: PartitionConfig,
        partitioner: P,
        catalog: Arc<TypeCatalog>,
    ) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        let config = PartitionConfig::new(config.shard_count)?;

        let mut shards = Vec::with_capacity(config.shard_count as usize);
        for ordinal in 0..config.shard_count {
            let path = config.shard_path(&location, ordinal);
            match ShardStore::open(&path, Arc::clone(&catalog)) {
                Ok(store) => shards.push(store),
                Err(source) => {
                    tracing::warn!(
                        location = %location.display(),
                        shard = ordinal,
                        released = shards.len(),
                        error = %source,
                        "shard set open failed"
                    );
                    drop(shards);
                    return Err(PartitionError::OpenFailed {
                        shard: ordinal,
                        source,
                    }
                    .into());
                }
            }
        }

        tracing::debug!(
            location = %location.display(),
            shards = config.shard_count,
            "opened shard set"
        );

        Ok(Self {
            location,
            config,
            partitioner,
            shards,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn shard_count(&self) -> u16 {
        self.config.shard_count
    }

    pub fn shard(&self, ordinal: u16) -> Option<&ShardStore> {
        self.shards.get(ordinal as usize)
    }

    /// Returns the ordinal of the shard that would hold `key`.
    pub fn shard_for(&self, key: &Value) -> Result<u16> {
        let key_bytes = key.to_bytes()?;
        Ok(select_shard(&self.partitioner, &key_bytes, &self.config)?)
    }

    /// Fetches the record stored under `key`, probing a single shard.
    ///
    /// `Ok(None)` means the key is absent. A reader configured with a
    /// different shard count or partitioner than the writer also yields
    /// `Ok(None)` for keys that do exist.
    pub fn lookup(&self, key: &Value) -> Result<Option<Record>> {
        let key_bytes = key.to_bytes()?;
        let shard = select_shard(&self.partitioner, &key_bytes, &self.config)?;
        tracing::debug!(key = %key, shard, "lookup");

        let store = &self.shards[shard as usize];
        Ok(store.lookup_encoded(key, &key_bytes)?)
    }

    /// Releases every shard handle.
    pub fn close(self) {
        let count = self.shards.len();
        for store in self.shards {
            store.close();
        }
        tracing::debug!(location = %self.location.display(), shards = count, "closed shard set");
    }
}

impl<P: Partitioner> std::fmt::Debug for PartitionedReader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedReader")
            .field("location", &self.location)
            .field("shard_count", &self.config.shard_count)
            .finish()
    }
}

/// Counts the shards under `location` from their file names.
pub fn discover_shard_count(location: &Path) -> std::result::Result<u16, PartitionError> {
    let entries = std::fs::read_dir(location).map_err(|source| PartitionError::Io {
        path: location.display().to_string(),
        source,
    })?;

    let mut highest: Option<u16> = None;
    for entry in entries {
        let entry = entry.map_err(|source| PartitionError::Io {
            path: location.display().to_string(),
            source,
        })?;
        let name = entry.file_name();
        if let Some(ordinal) = name.to_str().and_then(parse_shard_file_name) {
            highest = Some(highest.map_or(ordinal, |h| h.max(ordinal)));
        }
    }

    match highest {
        Some(u16::MAX) => Err(PartitionError::InvalidShardCount(u16::MAX)),
        Some(highest) => Ok(highest + 1),
        None => Err(PartitionError::NoShards(location.display().to_string())),
    }
}
