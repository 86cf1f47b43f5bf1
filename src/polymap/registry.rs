//! Per-serialization-unit type id table.
//!
//! Ids are a single byte in `0..=127`. The first [`RESERVED_IDS`] ids belong to
//! built-in types; the built-ins listed in [`BUILTIN_TYPES`] hold fixed ids
//! that every registry knows, so they are never written to the wire table.
//! Other types are assigned ids lazily, in registration order, from
//! [`FIRST_CUSTOM_ID`] upwards.
//!
//! Wire table: `[i32 count][count x (u8 id, u16 len, UTF-8 name)]`, custom
//! entries only, in id order.

use crate::encoding::{put_short_str, ByteReader};
use crate::error::EncodingError;
use crate::value::{
    Bool, Bytes, Double, Float, Int, Long, Null, Text, TypeCatalog, Value, WireValue,
};
use bytes::BufMut;
use std::collections::HashMap;
use std::sync::Arc;

use super::PolymorphicMap;

type Result<T> = std::result::Result<T, EncodingError>;

/// Highest id representable in the signed single-byte id space.
pub const MAX_TYPE_ID: u8 = 127;

/// Ids below this value are reserved for built-in types.
pub const RESERVED_IDS: u8 = 16;

/// First id handed out to a non-built-in type.
pub const FIRST_CUSTOM_ID: u8 = RESERVED_IDS;

/// Number of non-built-in types one serialization unit can hold.
pub const CUSTOM_CAPACITY: usize = (MAX_TYPE_ID - FIRST_CUSTOM_ID) as usize + 1;

/// Built-in type names; the index is the fixed id.
pub const BUILTIN_TYPES: [&str; 9] = [
    Null::TYPE_NAME,
    Bool::TYPE_NAME,
    Int::TYPE_NAME,
    Long::TYPE_NAME,
    Float::TYPE_NAME,
    Double::TYPE_NAME,
    Text::TYPE_NAME,
    Bytes::TYPE_NAME,
    PolymorphicMap::TYPE_NAME,
];

/// Bidirectional id <-> type name table.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_id: Vec<Option<String>>,
    by_name: HashMap<String, u8>,
    next_id: u8,
}

impl TypeRegistry {
    /// Creates a registry knowing only the built-in types.
    pub fn new() -> Self {
        let mut by_id = vec![None; MAX_TYPE_ID as usize + 1];
        let mut by_name = HashMap::new();
        for (id, name) in BUILTIN_TYPES.iter().enumerate() {
            by_id[id] = Some(name.to_string());
            by_name.insert(name.to_string(), id as u8);
        }
        Self {
            by_id,
            by_name,
            next_id: FIRST_CUSTOM_ID,
        }
    }

    /// Returns the id of `type_name`, assigning the next free id on first use.
    pub fn register(&mut self, type_name: &str) -> Result<u8> {
        if let Some(&id) = self.by_name.get(type_name) {
            return Ok(id);
        }
        if self.next_id > MAX_TYPE_ID {
            return Err(EncodingError::Capacity {
                limit: CUSTOM_CAPACITY,
            });
        }
        let id = self.next_id;
        self.insert(id, type_name.to_string());
        self.next_id += 1;
        Ok(id)
    }

    /// Registers both types of a key/value pair, or neither.
    pub fn register_pair(&mut self, key_type: &str, value_type: &str) -> Result<(u8, u8)> {
        let missing = [key_type, value_type]
            .iter()
            .filter(|name| !self.by_name.contains_key(**name))
            .count();
        let missing = if key_type == value_type {
            missing.min(1)
        } else {
            missing
        };
        if missing > self.free_slots() {
            return Err(EncodingError::Capacity {
                limit: CUSTOM_CAPACITY,
            });
        }
        Ok((self.register(key_type)?, self.register(value_type)?))
    }

    pub fn id_of(&self, type_name: &str) -> Result<u8> {
        self.by_name
            .get(type_name)
            .copied()
            .ok_or_else(|| EncodingError::UnregisteredType(type_name.to_string()))
    }

    pub fn type_name_of(&self, id: u8) -> Result<&str> {
        self.by_id
            .get(id as usize)
            .and_then(|slot| slot.as_deref())
            .ok_or(EncodingError::UnknownTypeId(id))
    }

    /// Resolves `id` and builds an empty instance through `catalog`.
    pub fn instantiate(&self, id: u8, catalog: &Arc<TypeCatalog>) -> Result<Value> {
        let name = self.type_name_of(id)?;
        catalog.instantiate(name)
    }

    /// Number of non-built-in types registered.
    pub fn custom_len(&self) -> usize {
        (self.next_id - FIRST_CUSTOM_ID) as usize
    }

    pub fn free_slots(&self) -> usize {
        CUSTOM_CAPACITY - self.custom_len()
    }

    fn insert(&mut self, id: u8, name: String) {
        self.by_id[id as usize] = Some(name.clone());
        self.by_name.insert(name, id);
    }

    fn custom_entries(&self) -> impl Iterator<Item = (u8, &str)> {
        (FIRST_CUSTOM_ID..self.next_id).filter_map(move |id| {
            self.by_id[id as usize]
                .as_deref()
                .map(|name| (id, name))
        })
    }

    /// Writes the custom part of the table.
    pub fn write_table(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_i32(self.custom_len() as i32);
        for (id, name) in self.custom_entries() {
            out.put_u8(id);
            put_short_str(out, name)?;
        }
        Ok(())
    }

    /// Reads a table written by [`write_table`](Self::write_table) into a
    /// fresh registry. Ids must be contiguous from [`FIRST_CUSTOM_ID`], as
    /// lazy registration always produces them.
    pub fn read_table(input: &mut ByteReader<'_>) -> Result<Self> {
        let count = input.read_i32()?;
        if count < 0 || count as usize > CUSTOM_CAPACITY {
            return Err(EncodingError::Decode(format!(
                "invalid type table size {}",
                count
            )));
        }

        let mut registry = Self::new();
        for _ in 0..count {
            let id = input.read_u8()?;
            let name = input.read_short_str()?;

            if id != registry.next_id {
                return Err(EncodingError::Decode(format!(
                    "type id {} out of sequence, expected {}",
                    id, registry.next_id
                )));
            }
            if registry.by_name.contains_key(name) {
                return Err(EncodingError::Decode(format!(
                    "type `{}` listed twice in type table",
                    name
                )));
            }

            registry.insert(id, name.to_string());
            registry.next_id += 1;
        }

        Ok(registry)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_name(i: usize) -> String {
        format!("custom.type.{}", i)
    }

    #[test]
    fn test_builtin_ids_are_fixed() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.id_of("null").unwrap(), 0);
        assert_eq!(registry.id_of("int").unwrap(), 2);
        assert_eq!(registry.id_of("text").unwrap(), 6);
        assert_eq!(registry.id_of("map").unwrap(), 8);
        assert_eq!(registry.custom_len(), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let first = registry.register("geo.point").unwrap();
        let second = registry.register("geo.point").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, FIRST_CUSTOM_ID);
        assert_eq!(registry.custom_len(), 1);

        assert_eq!(registry.register("int").unwrap(), 2);
        assert_eq!(registry.custom_len(), 1);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut registry = TypeRegistry::new();
        for i in 0..CUSTOM_CAPACITY {
            registry.register(&custom_name(i)).unwrap();
        }
        assert_eq!(registry.free_slots(), 0);
        assert_eq!(
            registry.id_of(&custom_name(CUSTOM_CAPACITY - 1)).unwrap(),
            MAX_TYPE_ID
        );

        let overflow = registry.register("one.too.many");
        assert!(matches!(
            overflow,
            Err(EncodingError::Capacity { limit }) if limit == CUSTOM_CAPACITY
        ));

        // Known types still resolve once full.
        assert!(registry.register(&custom_name(0)).is_ok());
    }

    #[test]
    fn test_register_pair_is_atomic() {
        let mut registry = TypeRegistry::new();
        for i in 0..CUSTOM_CAPACITY - 1 {
            registry.register(&custom_name(i)).unwrap();
        }

        assert!(registry.register_pair("new.key", "new.value").is_err());
        assert!(registry.id_of("new.key").is_err());

        assert!(registry.register_pair("new.key", "new.key").is_ok());
        assert_eq!(registry.free_slots(), 0);
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.id_of("nope"),
            Err(EncodingError::UnregisteredType(_))
        ));
        assert!(matches!(
            registry.type_name_of(40),
            Err(EncodingError::UnknownTypeId(40))
        ));
        assert!(matches!(
            registry.type_name_of(200),
            Err(EncodingError::UnknownTypeId(200))
        ));
    }

    #[test]
    fn test_instantiate_requires_factory() {
        let mut registry = TypeRegistry::new();
        let id = registry.register("not.in.catalog").unwrap();
        let catalog = TypeCatalog::shared_builtin();

        assert!(matches!(
            registry.instantiate(id, &catalog),
            Err(EncodingError::Instantiation(_))
        ));
        assert_eq!(
            registry.instantiate(2, &catalog).unwrap(),
            Value::new(Int::default())
        );
    }

    #[test]
    fn test_table_roundtrip() {
        let mut registry = TypeRegistry::new();
        registry.register("a.first").unwrap();
        registry.register("text").unwrap();
        registry.register("b.second").unwrap();

        let mut out = Vec::new();
        registry.write_table(&mut out).unwrap();
        assert_eq!(&out[..4], &2i32.to_be_bytes());

        let mut reader = ByteReader::new(&out);
        let decoded = TypeRegistry::read_table(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded.id_of("a.first").unwrap(), FIRST_CUSTOM_ID);
        assert_eq!(decoded.id_of("b.second").unwrap(), FIRST_CUSTOM_ID + 1);
        assert_eq!(decoded.type_name_of(6).unwrap(), "text");
    }

    #[test]
    fn test_table_rejects_bad_ids() {
        let mut out = Vec::new();
        out.put_i32(1);
        out.put_u8(3);
        put_short_str(&mut out, "sneaky").unwrap();

        let result = TypeRegistry::read_table(&mut ByteReader::new(&out));
        assert!(matches!(result, Err(EncodingError::Decode(_))));
    }

    #[test]
    fn test_table_rejects_negative_count() {
        let out = (-1i32).to_be_bytes();
        let result = TypeRegistry::read_table(&mut ByteReader::new(&out));
        assert!(matches!(result, Err(EncodingError::Decode(_))));
    }

    #[test]
    fn test_truncated_table() {
        let mut out = Vec::new();
        out.put_i32(2);
        out.put_u8(FIRST_CUSTOM_ID);
        put_short_str(&mut out, "only.one").unwrap();

        let result = TypeRegistry::read_table(&mut ByteReader::new(&out));
        assert!(matches!(result, Err(EncodingError::Truncated { .. })));
    }
}
