//! Factory table for decodable types.
//!
//! Decoding a self-describing stream yields type names; the catalog turns a
//! name into an empty instance that can then populate itself. The catalog is
//! immutable once built and is shared behind an `Arc`, so concurrent decodes
//! never contend on it.

use super::{Bool, Bytes, DynValue, Double, Float, Int, Long, Null, Text, Value, WireValue};
use crate::error::EncodingError;
use crate::polymap::PolymorphicMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds an empty instance. Receives the catalog so container types can
/// decode their own children with the same set of types.
pub type Factory = fn(&Arc<TypeCatalog>) -> Box<dyn DynValue>;

fn make_default<T: WireValue + Default>(_catalog: &Arc<TypeCatalog>) -> Box<dyn DynValue> {
    Box::new(T::default())
}

fn make_map(catalog: &Arc<TypeCatalog>) -> Box<dyn DynValue> {
    Box::new(PolymorphicMap::with_catalog(Arc::clone(catalog)))
}

/// Mapping from type name to factory.
#[derive(Clone)]
pub struct TypeCatalog {
    factories: HashMap<&'static str, Factory>,
}

impl TypeCatalog {
    /// Creates a catalog with no types at all, not even the built-ins.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a catalog holding every built-in type.
    pub fn builtin() -> Self {
        Self::empty()
            .with::<Null>()
            .with::<Bool>()
            .with::<Int>()
            .with::<Long>()
            .with::<Float>()
            .with::<Double>()
            .with::<Text>()
            .with::<Bytes>()
            .with_factory(PolymorphicMap::TYPE_NAME, make_map)
    }

    /// Shared built-in catalog used by maps and shards that were not given one.
    pub fn shared_builtin() -> Arc<TypeCatalog> {
        static BUILTIN: OnceLock<Arc<TypeCatalog>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(TypeCatalog::builtin())))
    }

    /// Adds a type constructible through `Default`.
    pub fn with<T: WireValue + Default>(self) -> Self {
        self.with_factory(T::TYPE_NAME, make_default::<T>)
    }

    /// Adds a type with an explicit factory. A later registration under the
    /// same name replaces the earlier one.
    pub fn with_factory(mut self, name: &'static str, factory: Factory) -> Self {
        self.factories.insert(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Builds an empty instance of the named type.
    pub fn instantiate(self: &Arc<Self>, name: &str) -> Result<Value, EncodingError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EncodingError::Instantiation(name.to_string()))?;
        Ok(Value::from_boxed(factory(self)))
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TypeCatalog").field("types", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_types() {
        let catalog = TypeCatalog::builtin();
        for name in ["null", "bool", "int", "long", "float", "double", "text", "bytes", "map"] {
            assert!(catalog.contains(name), "missing {}", name);
        }
        assert_eq!(catalog.len(), 9);
    }

    #[test]
    fn test_instantiate_empty_instance() {
        let catalog = Arc::new(TypeCatalog::builtin());
        let value = catalog.instantiate("text").unwrap();
        assert_eq!(value, Value::new(Text::default()));

        let map = catalog.instantiate("map").unwrap();
        assert!(map.downcast_ref::<PolymorphicMap>().unwrap().is_empty());
    }

    #[test]
    fn test_instantiate_unknown_name() {
        let catalog = Arc::new(TypeCatalog::empty());
        assert!(matches!(
            catalog.instantiate("int"),
            Err(EncodingError::Instantiation(name)) if name == "int"
        ));
    }

    #[test]
    fn test_shared_builtin_is_reused() {
        let first = TypeCatalog::shared_builtin();
        let second = TypeCatalog::shared_builtin();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
