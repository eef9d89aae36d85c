//! Field tables and dynamically typed field values.
//!
//! Server properties, client properties, and the nested `capabilities`
//! table all use this recursive structure. The wire form is a u32 byte
//! length followed by `short-string key, tag octet, value` entries; all
//! multi-byte integers are Big Endian.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// A keyed table of dynamically typed values.
///
/// Backed by a `BTreeMap` so encoding is deterministic.
pub type Table = BTreeMap<String, FieldValue>;

/// A dynamically typed value carried in a field table or array.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Boolean, tag `t`.
    Bool(bool),
    /// Signed 8-bit integer, tag `b`.
    I8(i8),
    /// Signed 16-bit integer, tag `s`.
    I16(i16),
    /// Signed 32-bit integer, tag `I`.
    I32(i32),
    /// Signed 64-bit integer, tag `l`.
    I64(i64),
    /// Single-precision float, tag `f`.
    F32(f32),
    /// Double-precision float, tag `d`.
    F64(f64),
    /// Long string, tag `S`. Despite the name, arbitrary bytes interpreted
    /// as UTF-8; non-UTF-8 payloads decode as [`FieldValue::Bytes`].
    LongStr(String),
    /// Raw byte array, tag `x`.
    Bytes(Vec<u8>),
    /// POSIX timestamp in seconds, tag `T`.
    Timestamp(u64),
    /// Nested value list, tag `A`.
    Array(Vec<FieldValue>),
    /// Nested table, tag `F`.
    Table(Table),
    /// No value, tag `V`.
    Void,
}

impl FieldValue {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            FieldValue::Bool(v) => {
                buf.put_u8(b't');
                buf.put_u8(u8::from(*v));
            }
            FieldValue::I8(v) => {
                buf.put_u8(b'b');
                buf.put_i8(*v);
            }
            FieldValue::I16(v) => {
                buf.put_u8(b's');
                buf.put_i16(*v);
            }
            FieldValue::I32(v) => {
                buf.put_u8(b'I');
                buf.put_i32(*v);
            }
            FieldValue::I64(v) => {
                buf.put_u8(b'l');
                buf.put_i64(*v);
            }
            FieldValue::F32(v) => {
                buf.put_u8(b'f');
                buf.put_f32(*v);
            }
            FieldValue::F64(v) => {
                buf.put_u8(b'd');
                buf.put_f64(*v);
            }
            FieldValue::LongStr(v) => {
                buf.put_u8(b'S');
                put_long_string(buf, v.as_bytes())?;
            }
            FieldValue::Bytes(v) => {
                buf.put_u8(b'x');
                put_long_string(buf, v)?;
            }
            FieldValue::Timestamp(v) => {
                buf.put_u8(b'T');
                buf.put_u64(*v);
            }
            FieldValue::Array(values) => {
                buf.put_u8(b'A');
                let mut inner = BytesMut::new();
                for value in values {
                    value.encode(&mut inner)?;
                }
                put_long_string(buf, &inner)?;
            }
            FieldValue::Table(table) => {
                buf.put_u8(b'F');
                encode_table(table, buf)?;
            }
            FieldValue::Void => buf.put_u8(b'V'),
        }
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<FieldValue> {
        let tag = get_u8(buf)?;
        let value = match tag {
            b't' => FieldValue::Bool(get_u8(buf)? != 0),
            b'b' => FieldValue::I8(get_u8(buf)? as i8),
            b's' => FieldValue::I16(get_int(buf, 2)? as i16),
            b'I' => FieldValue::I32(get_int(buf, 4)? as i32),
            b'l' => FieldValue::I64(get_int(buf, 8)? as i64),
            b'f' => FieldValue::F32(f32::from_bits(get_int(buf, 4)? as u32)),
            b'd' => FieldValue::F64(f64::from_bits(get_int(buf, 8)?)),
            b'S' => {
                let raw = get_long_string(buf)?;
                match String::from_utf8(raw) {
                    Ok(s) => FieldValue::LongStr(s),
                    Err(e) => FieldValue::Bytes(e.into_bytes()),
                }
            }
            b'x' => FieldValue::Bytes(get_long_string(buf)?),
            b'T' => FieldValue::Timestamp(get_int(buf, 8)?),
            b'A' => {
                let mut inner = Bytes::from(get_long_string(buf)?);
                let mut values = Vec::new();
                while inner.has_remaining() {
                    values.push(FieldValue::decode(&mut inner)?);
                }
                FieldValue::Array(values)
            }
            b'F' => FieldValue::Table(decode_table(buf)?),
            b'V' => FieldValue::Void,
            other => {
                return Err(Error::Frame(format!(
                    "unknown field value tag 0x{:02x}",
                    other
                )))
            }
        };
        Ok(value)
    }
}

/// Encode a table, length prefix included.
pub(crate) fn encode_table(table: &Table, buf: &mut BytesMut) -> Result<()> {
    let mut entries = BytesMut::new();
    for (key, value) in table {
        put_short_string(&mut entries, key)?;
        value.encode(&mut entries)?;
    }
    put_long_string(buf, &entries)
}

/// Decode a length-prefixed table.
pub(crate) fn decode_table(buf: &mut Bytes) -> Result<Table> {
    let mut entries = Bytes::from(get_long_string(buf)?);
    let mut table = Table::new();
    while entries.has_remaining() {
        let key = get_short_string(&mut entries)?;
        let value = FieldValue::decode(&mut entries)?;
        table.insert(key, value);
    }
    Ok(table)
}

/// Write a u8-length-prefixed short string (max 255 bytes).
pub(crate) fn put_short_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u8::try_from(s.len())
        .map_err(|_| Error::Frame(format!("short string of {} bytes exceeds 255", s.len())))?;
    buf.put_u8(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Read a u8-length-prefixed short string.
pub(crate) fn get_short_string(buf: &mut Bytes) -> Result<String> {
    let len = get_u8(buf)? as usize;
    if buf.remaining() < len {
        return Err(Error::Frame("truncated short string".to_string()));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| Error::Frame("short string is not valid UTF-8".to_string()))
}

/// Write a u32-length-prefixed long string.
pub(crate) fn put_long_string(buf: &mut BytesMut, s: &[u8]) -> Result<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| Error::Frame(format!("long string of {} bytes exceeds u32", s.len())))?;
    buf.put_u32(len);
    buf.put_slice(s);
    Ok(())
}

/// Read a u32-length-prefixed long string as raw bytes.
pub(crate) fn get_long_string(buf: &mut Bytes) -> Result<Vec<u8>> {
    let len = get_int(buf, 4)? as usize;
    if buf.remaining() < len {
        return Err(Error::Frame("truncated long string".to_string()));
    }
    Ok(buf.split_to(len).to_vec())
}

pub(crate) fn get_u8(buf: &mut Bytes) -> Result<u8> {
    if !buf.has_remaining() {
        return Err(Error::Frame("unexpected end of frame payload".to_string()));
    }
    Ok(buf.get_u8())
}

/// Read an unsigned Big Endian integer of `width` bytes (1, 2, 4, or 8).
pub(crate) fn get_int(buf: &mut Bytes, width: usize) -> Result<u64> {
    if buf.remaining() < width {
        return Err(Error::Frame("unexpected end of frame payload".to_string()));
    }
    Ok(buf.get_uint(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(table: &Table) -> Table {
        let mut buf = BytesMut::new();
        encode_table(table, &mut buf).unwrap();
        let mut bytes = buf.freeze();
        let decoded = decode_table(&mut bytes).unwrap();
        assert!(!bytes.has_remaining(), "decoder left trailing bytes");
        decoded
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new();
        assert_eq!(roundtrip(&table), table);

        // An empty table is just the 4-byte zero length.
        let mut buf = BytesMut::new();
        encode_table(&table, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_scalar_values() {
        let mut table = Table::new();
        table.insert("flag".into(), FieldValue::Bool(true));
        table.insert("tiny".into(), FieldValue::I8(-3));
        table.insert("short".into(), FieldValue::I16(-300));
        table.insert("int".into(), FieldValue::I32(70_000));
        table.insert("long".into(), FieldValue::I64(-5_000_000_000));
        table.insert("ratio".into(), FieldValue::F32(0.5));
        table.insert("precise".into(), FieldValue::F64(1.25));
        table.insert("name".into(), FieldValue::LongStr("broker-1".into()));
        table.insert("blob".into(), FieldValue::Bytes(vec![0xff, 0x00, 0x01]));
        table.insert("since".into(), FieldValue::Timestamp(1_700_000_000));
        table.insert("nothing".into(), FieldValue::Void);

        assert_eq!(roundtrip(&table), table);
    }

    #[test]
    fn test_nested_table_and_array() {
        let mut caps = Table::new();
        caps.insert("basic.ack".into(), FieldValue::Bool(true));
        caps.insert("confirm.select".into(), FieldValue::Bool(false));

        let mut table = Table::new();
        table.insert("capabilities".into(), FieldValue::Table(caps));
        table.insert(
            "versions".into(),
            FieldValue::Array(vec![
                FieldValue::LongStr("0-9-1".into()),
                FieldValue::I32(91),
            ]),
        );

        assert_eq!(roundtrip(&table), table);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut buf = BytesMut::new();
        put_long_string(&mut buf, b"\x03key?....").unwrap();
        let err = decode_table(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[test]
    fn test_truncated_table_rejected() {
        // Claims 32 bytes of entries but provides none.
        let mut bytes = Bytes::from_static(&[0, 0, 0, 32]);
        assert!(decode_table(&mut bytes).is_err());
    }

    #[test]
    fn test_short_string_limit() {
        let mut buf = BytesMut::new();
        assert!(put_short_string(&mut buf, &"x".repeat(255)).is_ok());
        assert!(put_short_string(&mut buf, &"x".repeat(256)).is_err());
    }
}
