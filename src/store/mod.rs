//! Sorted, immutable shard files.
//!
//! A shard is a redb database holding two tables:
//!
//! - `records`: serialized key bytes -> `[u8 value_type_id][value bytes]`
//! - `meta`: `key_type` (UTF-8 type name shared by every key) and
//!   `type_table` (the encoded [`TypeRegistry`] for value type ids)
//!
//! redb keeps `records` ordered by key bytes in a B-tree, so a point lookup
//! is a single indexed descent and never a scan. Shards are written once by
//! [`ShardBuilder`] and only read afterwards.

pub mod builder;

pub use builder::ShardBuilder;

use crate::encoding::ByteReader;
use crate::error::StoreError;
use crate::polymap::TypeRegistry;
use crate::value::{TypeCatalog, Value};
use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) const RECORDS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");
pub(crate) const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

pub(crate) const META_KEY_TYPE: &str = "key_type";
pub(crate) const META_TYPE_TABLE: &str = "type_table";

type Result<T> = std::result::Result<T, StoreError>;

/// A single key/value pair read from a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Value,
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Read handle on one shard file.
///
/// The handle owns the underlying database exclusively; dropping it (or
/// calling [`close`](Self::close)) releases the file.
pub struct ShardStore {
    path: PathBuf,
    db: Database,
    key_type: Option<String>,
    registry: TypeRegistry,
    catalog: Arc<TypeCatalog>,
}

impl ShardStore {
    /// Opens an existing shard and loads its metadata.
    ///
    /// Fails if the file is missing, is not a redb database, or lacks the
    /// shard tables.
    pub fn open(path: impl AsRef<Path>, catalog: Arc<TypeCatalog>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::open(&path).map_err(|err| StoreError::Open {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        let (key_type, registry) = read_meta(&db, &path)?;
        tracing::debug!(
            path = %path.display(),
            key_type = ?key_type,
            value_types = registry.custom_len(),
            "opened shard"
        );

        Ok(Self {
            path,
            db,
            key_type,
            registry,
            catalog,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Type name shared by every key, or `None` for an empty shard.
    pub fn key_type(&self) -> Option<&str> {
        self.key_type.as_deref()
    }

    /// Number of records in the shard.
    pub fn len(&self) -> Result<u64> {
        let txn = self
            .db
            .begin_read()
            .map_err(|err| StoreError::Storage(format!("begin read: {}", err)))?;
        let table = txn
            .open_table(RECORDS_TABLE)
            .map_err(|err| StoreError::Storage(format!("open records: {}", err)))?;
        table
            .len()
            .map_err(|err| StoreError::Storage(format!("count records: {}", err)))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Finds the record stored under `key`.
    ///
    /// A missing key is `Ok(None)`, and so is a key of a different type than
    /// the shard's keys, which can never be present.
    pub fn point_lookup(&self, key: &Value) -> Result<Option<Record>> {
        let key_bytes = key.to_bytes()?;
        self.lookup_encoded(key, &key_bytes)
    }

    /// Same as [`point_lookup`](Self::point_lookup) with the key already
    /// serialized.
    pub(crate) fn lookup_encoded(&self, key: &Value, key_bytes: &[u8]) -> Result<Option<Record>> {
        match self.key_type.as_deref() {
            Some(key_type) if key_type == key.type_name() => {}
            Some(key_type) => {
                tracing::debug!(
                    path = %self.path.display(),
                    expected = key_type,
                    actual = key.type_name(),
                    "key type not stored in shard"
                );
                return Ok(None);
            }
            None => return Ok(None),
        }

        let txn = self
            .db
            .begin_read()
            .map_err(|err| StoreError::Storage(format!("begin read: {}", err)))?;
        let table = txn
            .open_table(RECORDS_TABLE)
            .map_err(|err| StoreError::Storage(format!("open records: {}", err)))?;

        let guard = match table
            .get(key_bytes)
            .map_err(|err| StoreError::Storage(format!("get: {}", err)))?
        {
            Some(guard) => guard,
            None => return Ok(None),
        };

        let value = self.decode_value(guard.value())?;
        Ok(Some(Record {
            key: key.clone(),
            value,
        }))
    }

    fn decode_value(&self, data: &[u8]) -> Result<Value> {
        let mut reader = ByteReader::new(data);
        let type_id = reader.read_u8()?;
        let mut value = self.registry.instantiate(type_id, &self.catalog)?;
        value.read_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    /// Releases the shard file.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closed shard");
    }
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("path", &self.path)
            .field("key_type", &self.key_type)
            .finish()
    }
}

fn read_meta(db: &Database, path: &Path) -> Result<(Option<String>, TypeRegistry)> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let txn = db
        .begin_read()
        .map_err(|err| StoreError::Storage(format!("begin read: {}", err)))?;
    let meta = txn
        .open_table(META_TABLE)
        .map_err(|err| corrupt(format!("meta table: {}", err)))?;
    txn.open_table(RECORDS_TABLE)
        .map_err(|err| corrupt(format!("records table: {}", err)))?;

    let key_type = match meta
        .get(META_KEY_TYPE)
        .map_err(|err| StoreError::Storage(format!("read key type: {}", err)))?
    {
        Some(guard) => Some(
            std::str::from_utf8(guard.value())
                .map_err(|err| corrupt(format!("key type is not UTF-8: {}", err)))?
                .to_string(),
        ),
        None => None,
    };

    let guard = meta
        .get(META_TYPE_TABLE)
        .map_err(|err| StoreError::Storage(format!("read type table: {}", err)))?
        .ok_or_else(|| corrupt("missing type table".to_string()))?;
    let registry = TypeRegistry::read_table(&mut ByteReader::new(guard.value()))
        .map_err(|err| corrupt(format!("type table: {}", err)))?;

    Ok((key_type, registry))
}
