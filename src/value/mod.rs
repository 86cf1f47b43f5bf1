//! Self-serializing element types.
//!
//! Every key or value stored in a [`PolymorphicMap`](crate::polymap::PolymorphicMap)
//! or a shard implements [`WireValue`]: it knows its stable type name and how
//! to write itself to, and populate itself from, a byte stream. The map format
//! delegates element encoding entirely to this contract.
//!
//! [`Value`] is the owned, type-erased handle that makes heterogeneous
//! elements hashable and comparable so they can live in one map.

pub mod builtin;
pub mod catalog;

pub use builtin::{Bool, Bytes, Double, Float, Int, Long, Null, Text};
pub use catalog::TypeCatalog;

use crate::encoding::ByteReader;
use crate::error::EncodingError;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Per-element serialization contract.
///
/// `read_from` is always called on an empty instance produced by the
/// [`TypeCatalog`] and must consume exactly the bytes `write_to` produced.
pub trait WireValue: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Stable name written to registry tables. Must be unique per catalog.
    const TYPE_NAME: &'static str;

    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodingError>;

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<(), EncodingError>;
}

/// Object-safe view of a [`WireValue`], implemented for every `WireValue`.
pub trait DynValue: fmt::Debug + fmt::Display + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn write_dyn(&self, out: &mut Vec<u8>) -> Result<(), EncodingError>;
    fn read_dyn(&mut self, input: &mut ByteReader<'_>) -> Result<(), EncodingError>;
    fn as_any(&self) -> &dyn Any;
    fn eq_dyn(&self, other: &dyn DynValue) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
    fn clone_dyn(&self) -> Box<dyn DynValue>;
}

impl<T: WireValue> DynValue for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn write_dyn(&self, out: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.write_to(out)
    }

    fn read_dyn(&mut self, input: &mut ByteReader<'_>) -> Result<(), EncodingError> {
        self.read_from(input)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn DynValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        T::TYPE_NAME.hash(&mut state);
        self.hash(&mut state);
    }

    fn clone_dyn(&self) -> Box<dyn DynValue> {
        Box::new(self.clone())
    }
}

/// An owned element of any registered type.
///
/// Two values are equal only when they hold the same concrete type with
/// equal contents, so `Int(1)` and `Long(1)` are distinct keys.
pub struct Value(Box<dyn DynValue>);

impl Value {
    pub fn new<T: WireValue>(value: T) -> Self {
        Value(Box::new(value))
    }

    pub(crate) fn from_boxed(inner: Box<dyn DynValue>) -> Self {
        Value(inner)
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn downcast_ref<T: WireValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: WireValue>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Appends this value's encoding to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.0.write_dyn(out)
    }

    /// Populates this value from `input`, replacing its contents.
    pub fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<(), EncodingError> {
        self.0.read_dyn(input)
    }

    /// Encodes this value alone into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Value(self.0.clone_dyn())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_dyn(state);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::new(Int(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::new(Long(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::new(Float(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::new(Double(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::new(Bool(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(Text(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(Text(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::new(Bytes(value))
    }
}

impl From<crate::polymap::PolymorphicMap> for Value {
    fn from(value: crate::polymap::PolymorphicMap) -> Self {
        Value::new(value)
    }
}
