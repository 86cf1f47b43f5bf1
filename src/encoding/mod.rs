//! Binary encoding utilities.
//!
//! This module holds the big-endian primitives every value type uses to read
//! and write itself.

pub mod io;

pub use io::{put_len_prefixed, put_short_str, ByteReader, MAX_NESTING_DEPTH};
