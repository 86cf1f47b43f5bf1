//! Heterogeneous, self-describing map.
//!
//! A [`PolymorphicMap`] stores keys and values of any [`WireValue`] type and
//! serializes itself together with the table of type names it needs, so a
//! reader with a matching [`TypeCatalog`] can rebuild every element without
//! knowing the types in advance.
//!
//! Wire format, all integers big-endian:
//!
//! ```text
//! [i32 entry_count][type table][entry_count x (u8 key_type, u8 value_type, key, value)]
//! ```
//!
//! Both type ids of an entry precede both payloads. Readers that assume a
//! different order misparse silently instead of failing.

pub mod registry;

pub use registry::TypeRegistry;

use crate::encoding::ByteReader;
use crate::error::EncodingError;
use crate::value::{TypeCatalog, Value, WireValue};
use bytes::BufMut;
use std::collections::hash_map::{self, DefaultHasher};
use std::collections::HashMap;
use std::convert::TryInto;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type Result<T> = std::result::Result<T, EncodingError>;

/// Unordered map of heterogeneous keys and values.
///
/// Every map owns its own [`TypeRegistry`]; ids assigned by one map mean
/// nothing to another. Equality and hashing only consider the entries.
#[derive(Clone)]
pub struct PolymorphicMap {
    entries: HashMap<Value, Value>,
    registry: TypeRegistry,
    catalog: Arc<TypeCatalog>,
}

impl PolymorphicMap {
    /// Creates an empty map that decodes built-in types only.
    pub fn new() -> Self {
        Self::with_catalog(TypeCatalog::shared_builtin())
    }

    /// Creates an empty map that decodes the types known to `catalog`.
    pub fn with_catalog(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            entries: HashMap::new(),
            registry: TypeRegistry::new(),
            catalog,
        }
    }

    /// Decodes a complete map from `data`, rejecting trailing bytes.
    pub fn decode(data: &[u8], catalog: Arc<TypeCatalog>) -> Result<Self> {
        let mut map = Self::with_catalog(catalog);
        let mut reader = ByteReader::new(data);
        map.read_fields(&mut reader)?;
        reader.finish()?;
        Ok(map)
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Inserts a pair, returning the value previously stored under `key`.
    ///
    /// Both runtime types are registered first. If the registry is full the
    /// map is left untouched.
    pub fn put(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        self.registry
            .register_pair(key.type_name(), value.type_name())?;
        Ok(self.entries.insert(key, value))
    }

    /// Copies every entry of `other` into this map.
    ///
    /// Either all entries are copied or, when the combined types exceed the
    /// registry capacity, none are.
    pub fn extend_from(&mut self, other: &PolymorphicMap) -> Result<()> {
        let mut registry = self.registry.clone();
        for (key, value) in &other.entries {
            registry.register_pair(key.type_name(), value.type_name())?;
        }
        self.registry = registry;
        self.entries.extend(
            other
                .entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Looks up `key` and downcasts the value to `T`.
    pub fn get_as<T: WireValue>(&self, key: &Value) -> Option<&T> {
        self.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains_value(&self, value: &Value) -> bool {
        self.entries.values().any(|candidate| candidate == value)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries. Registered type ids are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Value, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> hash_map::Keys<'_, Value, Value> {
        self.entries.keys()
    }

    pub fn values(&self) -> hash_map::Values<'_, Value, Value> {
        self.entries.values()
    }

    /// Encodes the map into a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Appends the map encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        let count: i32 = self
            .entries
            .len()
            .try_into()
            .map_err(|_| EncodingError::TooLarge("entry count exceeds i32".to_string()))?;
        out.put_i32(count);

        self.registry.write_table(out)?;

        for (key, value) in &self.entries {
            out.put_u8(self.registry.id_of(key.type_name())?);
            out.put_u8(self.registry.id_of(value.type_name())?);
            key.write_to(out)?;
            value.write_to(out)?;
        }

        Ok(())
    }

    /// Replaces the contents of this map with the entries read from `input`.
    ///
    /// Prior entries are always discarded, so repeated reads into the same
    /// map never accumulate. On failure the map is left empty. Maps nested
    /// deeper than [`MAX_NESTING_DEPTH`] are rejected.
    ///
    /// [`MAX_NESTING_DEPTH`]: crate::encoding::MAX_NESTING_DEPTH
    pub fn read_fields(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.entries.clear();

        input.enter_nested()?;
        let decoded = read_entries(input, &self.catalog);
        input.leave_nested();

        let (registry, entries) = decoded?;
        self.registry = registry;
        self.entries = entries;
        Ok(())
    }
}

fn read_entries(
    input: &mut ByteReader<'_>,
    catalog: &Arc<TypeCatalog>,
) -> Result<(TypeRegistry, HashMap<Value, Value>)> {
    let count = input.read_i32()?;
    if count < 0 {
        return Err(EncodingError::Decode(format!(
            "negative entry count {}",
            count
        )));
    }
    let count = count as usize;

    // The type table must be complete before any entry can be resolved.
    let registry = TypeRegistry::read_table(input)?;

    // Every entry takes at least its two type id bytes.
    let mut entries = HashMap::with_capacity(count.min(input.remaining() / 2));
    for entry in 0..count {
        let (key, value) = read_entry(input, &registry, catalog).map_err(|err| match err {
            truncated @ EncodingError::Truncated { .. } => truncated,
            other => EncodingError::EntryDecode {
                entry,
                source: Box::new(other),
            },
        })?;
        entries.insert(key, value);
    }

    Ok((registry, entries))
}

fn read_entry(
    input: &mut ByteReader<'_>,
    registry: &TypeRegistry,
    catalog: &Arc<TypeCatalog>,
) -> Result<(Value, Value)> {
    let key_type = input.read_u8()?;
    let value_type = input.read_u8()?;

    let mut key = registry.instantiate(key_type, catalog)?;
    let mut value = registry.instantiate(value_type, catalog)?;

    key.read_from(input)?;
    value.read_from(input)?;

    Ok((key, value))
}

impl Default for PolymorphicMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PolymorphicMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for PolymorphicMap {}

impl Hash for PolymorphicMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Sum of per-entry hashes, so iteration order does not matter.
        let mut combined: u64 = 0;
        for entry in &self.entries {
            let mut hasher = DefaultHasher::new();
            entry.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        state.write_usize(self.entries.len());
        state.write_u64(combined);
    }
}

impl fmt::Debug for PolymorphicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl fmt::Display for PolymorphicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        rendered.sort();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

impl WireValue for PolymorphicMap {
    const TYPE_NAME: &'static str = "map";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.encode_into(out)
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.read_fields(input)
    }
}

impl<'a> IntoIterator for &'a PolymorphicMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = hash_map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
