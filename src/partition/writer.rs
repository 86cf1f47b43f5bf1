//! Producing a partitioned shard set.
//!
//! The writer routes each record through the same [`Partitioner`] a
//! [`PartitionedReader`](super::PartitionedReader) uses, and always creates
//! every shard file, including shards that receive no records, so readers
//! can open the full set.

use super::config::PartitionConfig;
use super::shard::{select_shard, HashPartitioner, Partitioner};
use crate::error::{PartitionError, Result};
use crate::store::ShardBuilder;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Writes records into `shard_count` new shard files under one directory.
pub struct PartitionedWriter<P: Partitioner = HashPartitioner> {
    location: PathBuf,
    config: PartitionConfig,
    partitioner: P,
    builders: Vec<ShardBuilder>,
}

impl PartitionedWriter<HashPartitioner> {
    /// Creates a shard set using the default partitioner.
    pub fn create(location: impl AsRef<Path>, shard_count: u16) -> Result<Self> {
        let config = PartitionConfig::new(shard_count)?;
        Self::create_with(location, config, HashPartitioner)
    }
}

impl<P: Partitioner> PartitionedWriter<P> {
    /// Creates the directory and every shard file.
    ///
    /// If any shard cannot be created, the files created so far are removed.
    pub fn create_with(
        location: impl AsRef<Path>,
        config: PartitionConfig,
        partitioner: P,
    ) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        let config = PartitionConfig::new(config.shard_count)?;

        std::fs::create_dir_all(&location).map_err(|source| PartitionError::Io {
            path: location.display().to_string(),
            source,
        })?;

        let mut builders = Vec::with_capacity(config.shard_count as usize);
        for ordinal in 0..config.shard_count {
            match ShardBuilder::create(config.shard_path(&location, ordinal)) {
                Ok(builder) => builders.push(builder),
                Err(source) => {
                    tracing::warn!(
                        location = %location.display(),
                        shard = ordinal,
                        error = %source,
                        "shard set create failed"
                    );
                    discard(builders);
                    return Err(PartitionError::OpenFailed {
                        shard: ordinal,
                        source,
                    }
                    .into());
                }
            }
        }

        Ok(Self {
            location,
            config,
            partitioner,
            builders,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Routes a record to its shard and returns that shard's ordinal.
    pub fn append(&mut self, key: &Value, value: &Value) -> Result<u16> {
        let key_bytes = key.to_bytes()?;
        let shard = select_shard(&self.partitioner, &key_bytes, &self.config)?;
        self.builders[shard as usize].append_encoded(key, key_bytes, value)?;
        Ok(shard)
    }

    /// Commits every shard. Returns the number of records in each shard,
    /// indexed by ordinal.
    pub fn finish(self) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(self.builders.len());
        for builder in self.builders {
            counts.push(builder.finish()?);
        }

        tracing::debug!(
            location = %self.location.display(),
            shards = counts.len(),
            records = counts.iter().sum::<u64>(),
            "finished shard set"
        );
        Ok(counts)
    }
}

fn discard(builders: Vec<ShardBuilder>) {
    for builder in builders {
        let path = builder.path().to_path_buf();
        drop(builder);
        if let Err(err) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove shard");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, StoreError};
    use crate::partition::config::shard_file_name;

    #[test]
    fn test_creates_every_shard_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("set");

        let mut writer = PartitionedWriter::create(&location, 4).unwrap();
        writer.append(&"only".into(), &1.into()).unwrap();
        let counts = writer.finish().unwrap();

        assert_eq!(counts.len(), 4);
        assert_eq!(counts.iter().sum::<u64>(), 1);
        for ordinal in 0..4 {
            assert!(location.join(shard_file_name(ordinal)).exists());
        }
    }

    #[test]
    fn test_append_reports_partition() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PartitionedWriter::create(dir.path(), 8).unwrap();

        let key = Value::from("some-key");
        let shard = writer.append(&key, &true.into()).unwrap();
        let expected =
            select_shard(&HashPartitioner, &key.to_bytes().unwrap(), writer.config()).unwrap();
        assert_eq!(shard, expected);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PartitionedWriter::create(dir.path(), 3).unwrap();

        writer.append(&7i64.into(), &"a".into()).unwrap();
        assert!(matches!(
            writer.append(&7i64.into(), &"b".into()),
            Err(Error::Store(StoreError::DuplicateKey(_)))
        ));
    }

    #[test]
    fn test_existing_shard_set_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        PartitionedWriter::create(dir.path(), 2)
            .unwrap()
            .finish()
            .unwrap();

        // Shard 0 already exists, so nothing new may be created or removed.
        let result = PartitionedWriter::create(dir.path(), 2);
        assert!(matches!(
            result,
            Err(Error::Partition(PartitionError::OpenFailed { shard: 0, .. }))
        ));
        assert!(dir.path().join(shard_file_name(0)).exists());
        assert!(dir.path().join(shard_file_name(1)).exists());
    }

    #[test]
    fn test_partial_create_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy shard 2 so creation fails after shards 0 and 1 exist.
        std::fs::write(dir.path().join(shard_file_name(2)), b"taken").unwrap();

        let result = PartitionedWriter::create(dir.path(), 3);
        assert!(matches!(
            result,
            Err(Error::Partition(PartitionError::OpenFailed { shard: 2, .. }))
        ));
        assert!(!dir.path().join(shard_file_name(0)).exists());
        assert!(!dir.path().join(shard_file_name(1)).exists());
    }
}
