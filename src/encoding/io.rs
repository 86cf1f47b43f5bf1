//! Big-endian primitive encoding.
//!
//! Writes go straight into a `Vec<u8>` through [`bytes::BufMut`]. Reads go
//! through [`ByteReader`], which checks the remaining length before every
//! access so a short buffer surfaces as [`EncodingError::Truncated`] instead
//! of a panic.

use crate::error::EncodingError;
use bytes::{Buf, BufMut};
use std::convert::TryInto;

pub type Result<T> = std::result::Result<T, EncodingError>;

/// Deepest nesting of containers a single decode may enter.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Cursor over an encoded byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    depth: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, depth: 0 }
    }

    /// Current container nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Marks the start of a nested container.
    ///
    /// Fails once [`MAX_NESTING_DEPTH`] containers are open. Every successful
    /// call must be paired with [`leave_nested`](Self::leave_nested).
    pub fn enter_nested(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(EncodingError::Decode(format!(
                "nesting too deep: more than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(EncodingError::Truncated {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Reads a `u32` length prefix followed by that many bytes.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_slice(len)
    }

    /// Reads a `u16` length prefix followed by UTF-8 text.
    pub fn read_short_str(&mut self) -> Result<&'a str> {
        let len = self.read_u16()? as usize;
        let raw = self.read_slice(len)?;
        std::str::from_utf8(raw).map_err(|e| EncodingError::Decode(format!("invalid UTF-8: {}", e)))
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(EncodingError::Decode(format!(
                "{} trailing bytes after value",
                self.buf.len()
            )));
        }
        Ok(())
    }
}

/// Writes a `u32` length prefix followed by the bytes.
pub fn put_len_prefixed(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len: u32 = data
        .len()
        .try_into()
        .map_err(|_| EncodingError::TooLarge(format!("{} bytes exceed u32 length prefix", data.len())))?;
    out.put_u32(len);
    out.put_slice(data);
    Ok(())
}

/// Writes a `u16` length prefix followed by UTF-8 text.
pub fn put_short_str(out: &mut Vec<u8>, text: &str) -> Result<()> {
    let len: u16 = text
        .len()
        .try_into()
        .map_err(|_| EncodingError::TooLarge(format!("{} byte name exceeds u16 length prefix", text.len())))?;
    out.put_u16(len);
    out.put_slice(text.as_bytes());
    Ok(())
}
