//! Crate-scoped error handling for redb-polymap.
//!
//! This module provides a unified error type for public APIs while maintaining
//! precise error information for each layer: value encoding, shard storage and
//! partitioning.

use std::fmt;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding or decoding values and registry tables.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The serialization unit needs more type ids than a single byte allows.
    #[error("type registry is full: at most {limit} custom types per serialization unit")]
    Capacity { limit: usize },

    /// A type id was read that the registry table does not define.
    #[error("unknown type id {0}")]
    UnknownTypeId(u8),

    /// A type was looked up that was never registered.
    #[error("type `{0}` is not registered")]
    UnregisteredType(String),

    /// The catalog has no factory able to build an empty instance of the type.
    #[error("cannot instantiate type `{0}`: no factory in catalog")]
    Instantiation(String),

    /// The input ended before a complete value could be read.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The input is structurally invalid.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value is too large for its length prefix.
    #[error("cannot encode: {0}")]
    TooLarge(String),

    /// Decoding a specific map entry failed.
    #[error("failed to decode entry {entry}: {source}")]
    EntryDecode {
        entry: usize,
        #[source]
        source: Box<EncodingError>,
    },
}

/// Errors raised by a single shard file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The shard file could not be opened or created.
    #[error("failed to open shard {path}: {reason}")]
    Open { path: String, reason: String },

    /// Underlying redb failure during a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// The file is a valid database but not a valid shard.
    #[error("corrupt shard {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// A key was appended twice to the same shard.
    #[error("duplicate key in shard: {0}")]
    DuplicateKey(String),

    /// All keys of a shard share one type.
    #[error("key type mismatch: shard holds `{expected}` keys, got `{actual}`")]
    KeyTypeMismatch { expected: String, actual: String },

    /// A stored record could not be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Errors raised by the partitioned reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("invalid shard count: {0}")]
    InvalidShardCount(u16),

    #[error("shard {shard} out of range for {shard_count} shards")]
    ShardOutOfRange { shard: u16, shard_count: u16 },

    /// Opening one shard of the set failed; the whole open was aborted.
    #[error("failed to open shard {shard}: {source}")]
    OpenFailed {
        shard: u16,
        #[source]
        source: StoreError,
    },

    #[error("no shard files found in {0}")]
    NoShards(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Main error type exposed to users of the crate.
///
/// Wraps the layer-specific error types so callers can match on the layer
/// that failed while still using a single `Result` alias.
#[derive(Debug)]
pub enum Error {
    /// Errors from value, map and registry encoding
    Encoding(EncodingError),

    /// Errors from a single shard store
    Store(StoreError),

    /// Errors from the partition layer
    Partition(PartitionError),
}

impl From<EncodingError> for Error {
    fn from(err: EncodingError) -> Self {
        Error::Encoding(err)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

impl From<PartitionError> for Error {
    fn from(err: PartitionError) -> Self {
        Error::Partition(err)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Encoding(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::Partition(err) => Some(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Encoding(err) => write!(f, "Encoding error: {}", err),
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Partition(err) => write!(f, "Partition error: {}", err),
        }
    }
}

impl Error {
    /// Returns true when the failure came from the storage layer rather than
    /// from malformed input.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError::Open { .. })
                | Error::Store(StoreError::Storage(_))
                | Error::Store(StoreError::Corrupt { .. })
                | Error::Partition(PartitionError::OpenFailed { .. })
                | Error::Partition(PartitionError::Io { .. })
                | Error::Partition(PartitionError::NoShards(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_every_variant_wraps_a_layer_error() {
        let encoding = Error::from(EncodingError::UnknownTypeId(99));
        let store = Error::from(StoreError::Storage("disk".to_string()));
        let partition = Error::from(PartitionError::InvalidShardCount(0));

        assert_eq!(encoding.to_string(), "Encoding error: unknown type id 99");
        assert_eq!(store.to_string(), "Store error: storage error: disk");
        assert_eq!(partition.to_string(), "Partition error: invalid shard count: 0");

        for err in [&encoding, &store, &partition] {
            assert!(err.source().is_some());
        }
        assert!(!encoding.is_io());
        assert!(store.is_io());
        assert!(!partition.is_io());
    }
}
