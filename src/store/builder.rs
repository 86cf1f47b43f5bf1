//! One-shot shard writer.
//!
//! Records are buffered in key order and written in a single redb commit by
//! [`ShardBuilder::finish`]. A shard is never reopened for writing.

use super::{Record, META_KEY_TYPE, META_TABLE, META_TYPE_TABLE, RECORDS_TABLE};
use crate::error::StoreError;
use crate::polymap::TypeRegistry;
use crate::value::Value;
use bytes::BufMut;
use redb::Database;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, StoreError>;

/// Builds a new shard file.
pub struct ShardBuilder {
    path: PathBuf,
    db: Database,
    key_type: Option<&'static str>,
    registry: TypeRegistry,
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl ShardBuilder {
    /// Creates the shard file. Refuses to touch an existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StoreError::Open {
                path: path.display().to_string(),
                reason: "shard already exists".to_string(),
            });
        }

        let db = Database::create(&path).map_err(|err| StoreError::Open {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            path,
            db,
            key_type: None,
            registry: TypeRegistry::new(),
            records: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a record. Keys must be unique and all of the same type.
    pub fn append(&mut self, key: &Value, value: &Value) -> Result<()> {
        let key_bytes = key.to_bytes()?;
        self.append_encoded(key, key_bytes, value)
    }

    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        self.append(&record.key, &record.value)
    }

    /// Adds a record whose key was already serialized by the caller.
    pub(crate) fn append_encoded(
        &mut self,
        key: &Value,
        key_bytes: Vec<u8>,
        value: &Value,
    ) -> Result<()> {
        if let Some(expected) = self.key_type {
            if expected != key.type_name() {
                return Err(StoreError::KeyTypeMismatch {
                    expected: expected.to_string(),
                    actual: key.type_name().to_string(),
                });
            }
        }

        if self.records.contains_key(&key_bytes) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        // The leading type id is filled in once the value has encoded.
        let mut encoded = Vec::new();
        encoded.put_u8(0);
        value.write_to(&mut encoded)?;
        encoded[0] = self.registry.register(value.type_name())?;

        self.key_type = Some(key.type_name());
        self.records.insert(key_bytes, encoded);
        Ok(())
    }

    /// Writes every buffered record and the shard metadata, then closes the
    /// file. Returns the number of records written.
    pub fn finish(self) -> Result<u64> {
        let mut type_table = Vec::new();
        self.registry.write_table(&mut type_table)?;

        let txn = self
            .db
            .begin_write()
            .map_err(|err| StoreError::Storage(format!("begin write: {}", err)))?;
        {
            let mut records = txn
                .open_table(RECORDS_TABLE)
                .map_err(|err| StoreError::Storage(format!("open records: {}", err)))?;
            for (key, value) in &self.records {
                records
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(|err| StoreError::Storage(format!("insert: {}", err)))?;
            }

            let mut meta = txn
                .open_table(META_TABLE)
                .map_err(|err| StoreError::Storage(format!("open meta: {}", err)))?;
            if let Some(key_type) = self.key_type {
                meta.insert(META_KEY_TYPE, key_type.as_bytes())
                    .map_err(|err| StoreError::Storage(format!("insert key type: {}", err)))?;
            }
            meta.insert(META_TYPE_TABLE, type_table.as_slice())
                .map_err(|err| StoreError::Storage(format!("insert type table: {}", err)))?;
        }
        txn.commit()
            .map_err(|err| StoreError::Storage(format!("commit: {}", err)))?;

        let written = self.records.len() as u64;
        tracing::debug!(
            path = %self.path.display(),
            records = written,
            "finished shard"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::ByteReader;
    use crate::error::EncodingError;
    use crate::value::{TypeCatalog, WireValue};
    use std::fmt;

    #[test]
    fn test_rejects_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ShardBuilder::create(dir.path().join("s.redb")).unwrap();

        builder.append(&"k".into(), &1.into()).unwrap();
        let result = builder.append(&"k".into(), &2.into());
        assert!(matches!(result, Err(StoreError::DuplicateKey(key)) if key == "k"));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_rejects_mixed_key_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ShardBuilder::create(dir.path().join("s.redb")).unwrap();

        builder.append(&"k".into(), &1.into()).unwrap();
        let result = builder.append(&1.into(), &1.into());
        assert!(matches!(result, Err(StoreError::KeyTypeMismatch { .. })));
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
    struct Unwritable;

    impl WireValue for Unwritable {
        const TYPE_NAME: &'static str = "test.unwritable";

        fn write_to(&self, _out: &mut Vec<u8>) -> std::result::Result<(), EncodingError> {
            Err(EncodingError::TooLarge("unwritable".to_string()))
        }

        fn read_from(
            &mut self,
            _input: &mut ByteReader<'_>,
        ) -> std::result::Result<(), EncodingError> {
            Ok(())
        }
    }

    impl fmt::Display for Unwritable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "unwritable")
        }
    }

    #[test]
    fn test_failed_first_append_leaves_builder_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.redb");
        let mut builder = ShardBuilder::create(&path).unwrap();

        let result = builder.append(&1.into(), &Value::new(Unwritable));
        assert!(matches!(
            result,
            Err(StoreError::Encoding(EncodingError::TooLarge(_)))
        ));
        assert!(builder.is_empty());
        assert_eq!(builder.registry.custom_len(), 0);

        // Neither the key type nor a value type id was claimed.
        builder.append(&"k".into(), &1.into()).unwrap();
        assert_eq!(builder.finish().unwrap(), 1);

        let store = crate::store::ShardStore::open(&path, TypeCatalog::shared_builtin()).unwrap();
        assert_eq!(store.key_type(), Some("text"));
        assert_eq!(
            store.point_lookup(&"k".into()).unwrap(),
            Some(Record::new("k", 1))
        );
    }

    #[test]
    fn test_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.redb");
        ShardBuilder::create(&path).unwrap().finish().unwrap();

        assert!(matches!(
            ShardBuilder::create(&path),
            Err(StoreError::Open { .. })
        ));
    }

    #[test]
    fn test_finish_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ShardBuilder::create(dir.path().join("s.redb")).unwrap();
        builder
            .append_record(&Record::new(1i64, vec![1u8, 2]))
            .unwrap();
        builder.append_record(&Record::new(2i64, true)).unwrap();
        assert_eq!(builder.finish().unwrap(), 2);
    }

    #[test]
    fn test_value_type_capacity() {
        use crate::polymap::registry::CUSTOM_CAPACITY;

        let dir = tempfile::tempdir().unwrap();
        let mut builder = ShardBuilder::create(dir.path().join("s.redb")).unwrap();
        for i in 0..CUSTOM_CAPACITY {
            builder.registry.register(&format!("filler.{}", i)).unwrap();
        }

        // Built-in value types still fit.
        builder.append(&"a".into(), &1.into()).unwrap();
        assert_eq!(builder.registry.free_slots(), 0);
        assert!(matches!(
            builder.registry.register("extra"),
            Err(EncodingError::Capacity { .. })
        ));
    }
}
