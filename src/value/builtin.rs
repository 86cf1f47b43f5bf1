//! Built-in element types.
//!
//! All integers are big-endian. Floating point values are stored as their
//! IEEE bit patterns, and compare and hash by those bits so they can be used
//! as map keys.

use super::WireValue;
use crate::encoding::{put_len_prefixed, ByteReader};
use crate::error::EncodingError;
use bytes::BufMut;
use std::fmt;
use std::hash::{Hash, Hasher};

type Result<T> = std::result::Result<T, EncodingError>;

/// Empty placeholder value. Encodes to zero bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Null;

impl WireValue for Null {
    const TYPE_NAME: &'static str = "null";

    fn write_to(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn read_from(&mut self, _input: &mut ByteReader<'_>) -> Result<()> {
        Ok(())
    }
}

impl fmt::Display for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "null")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bool(pub bool);

impl WireValue for Bool {
    const TYPE_NAME: &'static str = "bool";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(self.0 as u8);
        Ok(())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.0 = match input.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(EncodingError::Decode(format!(
                    "invalid boolean byte {:#04x}",
                    other
                )))
            }
        };
        Ok(())
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Int(pub i32);

impl WireValue for Int {
    const TYPE_NAME: &'static str = "int";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_i32(self.0);
        Ok(())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.0 = input.read_i32()?;
        Ok(())
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Long(pub i64);

impl WireValue for Long {
    const TYPE_NAME: &'static str = "long";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_i64(self.0);
        Ok(())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.0 = input.read_i64()?;
        Ok(())
    }
}

impl fmt::Display for Long {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Float(pub f32);

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl WireValue for Float {
    const TYPE_NAME: &'static str = "float";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u32(self.0.to_bits());
        Ok(())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.0 = f32::from_bits(input.read_u32()?);
        Ok(())
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Double(pub f64);

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Double {}

impl Hash for Double {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl WireValue for Double {
    const TYPE_NAME: &'static str = "double";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u64(self.0.to_bits());
        Ok(())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        self.0 = f64::from_bits(input.read_u64()?);
        Ok(())
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTF-8 text with a `u32` length prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Text(pub String);

impl Text {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl WireValue for Text {
    const TYPE_NAME: &'static str = "text";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        put_len_prefixed(out, self.0.as_bytes())
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        let raw = input.read_len_prefixed()?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| EncodingError::Decode(format!("invalid UTF-8 in text: {}", e)))?;
        self.0.clear();
        self.0.push_str(text);
        Ok(())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque bytes with a `u32` length prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bytes(pub Vec<u8>);

impl WireValue for Bytes {
    const TYPE_NAME: &'static str = "bytes";

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        put_len_prefixed(out, &self.0)
    }

    fn read_from(&mut self, input: &mut ByteReader<'_>) -> Result<()> {
        let raw = input.read_len_prefixed()?;
        self.0.clear();
        self.0.extend_from_slice(raw);
        Ok(())
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: WireValue>(value: &T) -> Vec<u8> {
        let mut out = Vec::new();
        value.write_to(&mut out).unwrap();
        out
    }

    fn decode<T: WireValue + Default>(data: &[u8]) -> Result<T> {
        let mut value = T::default();
        let mut reader = ByteReader::new(data);
        value.read_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    #[test]
    fn test_fixed_width_layouts() {
        assert!(encode(&Null).is_empty());
        assert_eq!(encode(&Bool(true)), vec![1]);
        assert_eq!(encode(&Int(258)), vec![0, 0, 1, 2]);
        assert_eq!(encode(&Long(-1)), vec![0xff; 8]);
        assert_eq!(encode(&Float(1.0)), 1.0f32.to_bits().to_be_bytes().to_vec());
        assert_eq!(encode(&Double(0.5)), 0.5f64.to_bits().to_be_bytes().to_vec());
    }

    #[test]
    fn test_text_layout() {
        let encoded = encode(&Text("héllo".to_string()));
        assert_eq!(&encoded[..4], &6u32.to_be_bytes());
        assert_eq!(&encoded[4..], "héllo".as_bytes());
        assert_eq!(decode::<Text>(&encoded).unwrap(), Text("héllo".to_string()));
    }

    #[test]
    fn test_read_replaces_previous_contents() {
        let mut text = Text("stale".to_string());
        let encoded = encode(&Text("new".to_string()));
        text.read_from(&mut ByteReader::new(&encoded)).unwrap();
        assert_eq!(text.as_str(), "new");

        let mut bytes = Bytes(vec![9, 9, 9]);
        let encoded = encode(&Bytes(vec![1]));
        bytes.read_from(&mut ByteReader::new(&encoded)).unwrap();
        assert_eq!(bytes.0, vec![1]);
    }

    #[test]
    fn test_invalid_bool() {
        assert!(matches!(decode::<Bool>(&[2]), Err(EncodingError::Decode(_))));
    }

    #[test]
    fn test_invalid_utf8_text() {
        let mut data = 2u32.to_be_bytes().to_vec();
        data.extend_from_slice(&[0xc3, 0x28]);
        assert!(matches!(decode::<Text>(&data), Err(EncodingError::Decode(_))));
    }

    #[test]
    fn test_truncated_long() {
        assert!(matches!(
            decode::<Long>(&[0, 0, 0]),
            Err(EncodingError::Truncated { needed: 8, remaining: 3 })
        ));
    }

    #[test]
    fn test_float_nan_is_self_equal() {
        let nan = Double(f64::NAN);
        assert_eq!(nan, nan);
        assert_ne!(Double(0.0), Double(-0.0));
    }

    #[test]
    fn test_bytes_display_hex() {
        assert_eq!(Bytes(vec![0x0a, 0xff]).to_string(), "0aff");
    }
}
