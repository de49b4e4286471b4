//! Attribute Codec
//!
//! Encodes a feature's property table against the stream's column list and
//! decodes it back.
//!
//! ## Block Format
//!
//! ```text
//! Entry 1:
//!   - Tag index (u16 LE) - position of the column in the header's column list
//!   - Value:
//!       Bool / Byte / UByte          1 byte  (bool: 0 or 1)
//!       Short / UShort               2 bytes LE
//!       Int / UInt / Float           4 bytes LE
//!       Long / ULong / Double        8 bytes LE
//!       String / DateTime            u32 LE byte length + UTF-8 bytes
//! Entry 2:
//!   ...
//! ```
//!
//! There is no entry count and no terminator. The enclosing record stores the
//! block length and the decoder must land exactly on it.
//!
//! Entries are written in column order, so the same properties against the
//! same columns always produce identical bytes. Absent and `Null` properties
//! are never written, and decoding never invents a key for them.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use geostream_core::{ColumnMeta, ColumnType, Error, Properties, Result, Value};

/// Encode properties in column order. Returns an empty buffer when nothing was written.
pub fn encode_properties(properties: &Properties, columns: &[ColumnMeta]) -> Result<Bytes> {
    let mut buf = BytesMut::new();

    for (index, column) in columns.iter().enumerate() {
        let value = match properties.get(&column.name) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };

        let tag = u16::try_from(index)
            .map_err(|_| Error::Format(format!("column index {} exceeds u16", index)))?;
        buf.put_u16_le(tag);
        encode_value(&mut buf, column, value)?;
    }

    Ok(buf.freeze())
}

fn encode_value(buf: &mut BytesMut, column: &ColumnMeta, value: &Value) -> Result<()> {
    match (column.column_type, value) {
        (ColumnType::Bool, Value::Bool(v)) => buf.put_u8(u8::from(*v)),
        (ColumnType::Byte, Value::Byte(v)) => buf.put_i8(*v),
        (ColumnType::UByte, Value::UByte(v)) => buf.put_u8(*v),
        (ColumnType::Short, Value::Short(v)) => buf.put_i16_le(*v),
        (ColumnType::UShort, Value::UShort(v)) => buf.put_u16_le(*v),
        (ColumnType::Int, Value::Int(v)) => buf.put_i32_le(*v),
        (ColumnType::UInt, Value::UInt(v)) => buf.put_u32_le(*v),
        (ColumnType::Long, Value::Long(v)) => buf.put_i64_le(*v),
        (ColumnType::ULong, Value::ULong(v)) => buf.put_u64_le(*v),
        (ColumnType::Float, Value::Float(v)) => buf.put_f32_le(*v),
        (ColumnType::Double, Value::Double(v)) => buf.put_f64_le(*v),
        (ColumnType::String | ColumnType::DateTime, Value::String(s)) => {
            let len = u32::try_from(s.len()).map_err(|_| {
                Error::Format(format!("string in column '{}' exceeds u32 length", column.name))
            })?;
            buf.put_u32_le(len);
            buf.put_slice(s.as_bytes());
        }
        (expected, other) => {
            return Err(Error::TypeMismatch {
                column: column.name.clone(),
                expected,
                found: other.type_name(),
            })
        }
    }
    Ok(())
}

/// Decode an attribute block. Must consume `data` exactly.
pub fn decode_properties(data: &[u8], columns: &[ColumnMeta]) -> Result<Properties> {
    let mut properties = Properties::new();
    let mut cursor = data;

    while cursor.has_remaining() {
        if cursor.remaining() < 2 {
            return Err(Error::truncated("column index"));
        }
        let tag = cursor.get_u16_le();
        let column = columns.get(tag as usize).ok_or(Error::Schema {
            tag,
            column_count: columns.len(),
        })?;

        let value = decode_value(&mut cursor, column)?;
        properties.insert(column.name.clone(), value);
    }

    Ok(properties)
}

fn decode_value(cursor: &mut &[u8], column: &ColumnMeta) -> Result<Value> {
    if let Some(width) = column.column_type.fixed_width() {
        if cursor.remaining() < width {
            return Err(Error::truncated(&format!("value of column '{}'", column.name)));
        }
    }

    let value = match column.column_type {
        ColumnType::Bool => match cursor.get_u8() {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(Error::Format(format!(
                    "invalid bool byte {} in column '{}'",
                    other, column.name
                )))
            }
        },
        ColumnType::Byte => Value::Byte(cursor.get_i8()),
        ColumnType::UByte => Value::UByte(cursor.get_u8()),
        ColumnType::Short => Value::Short(cursor.get_i16_le()),
        ColumnType::UShort => Value::UShort(cursor.get_u16_le()),
        ColumnType::Int => Value::Int(cursor.get_i32_le()),
        ColumnType::UInt => Value::UInt(cursor.get_u32_le()),
        ColumnType::Long => Value::Long(cursor.get_i64_le()),
        ColumnType::ULong => Value::ULong(cursor.get_u64_le()),
        ColumnType::Float => Value::Float(cursor.get_f32_le()),
        ColumnType::Double => Value::Double(cursor.get_f64_le()),
        ColumnType::String | ColumnType::DateTime => {
            if cursor.remaining() < 4 {
                return Err(Error::truncated(&format!(
                    "string length of column '{}'",
                    column.name
                )));
            }
            let len = cursor.get_u32_le() as usize;
            if cursor.remaining() < len {
                return Err(Error::truncated(&format!("string of column '{}'", column.name)));
            }
            let text = std::str::from_utf8(&cursor[..len]).map_err(|e| {
                Error::Format(format!("invalid UTF-8 in column '{}': {}", column.name, e))
            })?;
            let value = Value::String(text.to_string());
            cursor.advance(len);
            value
        }
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_name_columns() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta::new("id", ColumnType::Int),
            ColumnMeta::new("name", ColumnType::String),
        ]
    }

    fn props(entries: Vec<(&str, Value)>) -> Properties {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_exact_bytes_id_name() {
        let properties = props(vec![("id", Value::Int(5)), ("name", Value::from("a"))]);
        let encoded = encode_properties(&properties, &id_name_columns()).unwrap();

        assert_eq!(
            encoded.as_ref(),
            &[0x00, 0x00, 5, 0, 0, 0, 0x01, 0x00, 1, 0, 0, 0, b'a']
        );

        let decoded = decode_properties(&encoded, &id_name_columns()).unwrap();
        assert_eq!(decoded, properties);
    }

    #[test]
    fn test_schema_order_not_property_order() {
        let forward = props(vec![("id", Value::Int(1)), ("name", Value::from("x"))]);
        let backward = props(vec![("name", Value::from("x")), ("id", Value::Int(1))]);

        let a = encode_properties(&forward, &id_name_columns()).unwrap();
        let b = encode_properties(&backward, &id_name_columns()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, encode_properties(&forward, &id_name_columns()).unwrap());
    }

    #[test]
    fn test_sparse_and_null_skipped() {
        let properties = props(vec![("id", Value::Null), ("name", Value::from("b"))]);
        let encoded = encode_properties(&properties, &id_name_columns()).unwrap();

        // Only the name entry (tag 1)
        assert_eq!(&encoded[..2], &[0x01, 0x00]);
        assert_eq!(encoded.len(), 2 + 4 + 1);

        let decoded = decode_properties(&encoded, &id_name_columns()).unwrap();
        assert!(!decoded.contains_key("id"));
        assert_eq!(decoded.get("name"), Some(&Value::from("b")));
    }

    #[test]
    fn test_unknown_property_name_ignored() {
        let properties = props(vec![("other", Value::Int(9))]);
        let encoded = encode_properties(&properties, &id_name_columns()).unwrap();
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_all_types_roundtrip() {
        let columns = vec![
            ColumnMeta::new("b", ColumnType::Bool),
            ColumnMeta::new("i8", ColumnType::Byte),
            ColumnMeta::new("u8", ColumnType::UByte),
            ColumnMeta::new("i16", ColumnType::Short),
            ColumnMeta::new("u16", ColumnType::UShort),
            ColumnMeta::new("i32", ColumnType::Int),
            ColumnMeta::new("u32", ColumnType::UInt),
            ColumnMeta::new("i64", ColumnType::Long),
            ColumnMeta::new("u64", ColumnType::ULong),
            ColumnMeta::new("f32", ColumnType::Float),
            ColumnMeta::new("f64", ColumnType::Double),
            ColumnMeta::new("s", ColumnType::String),
            ColumnMeta::new("dt", ColumnType::DateTime),
        ];
        let properties = props(vec![
            ("b", Value::Bool(true)),
            ("i8", Value::Byte(-8)),
            ("u8", Value::UByte(200)),
            ("i16", Value::Short(-1600)),
            ("u16", Value::UShort(60000)),
            ("i32", Value::Int(i32::MIN)),
            ("u32", Value::UInt(u32::MAX)),
            ("i64", Value::Long(-42)),
            ("u64", Value::ULong(u64::MAX)),
            ("f32", Value::Float(1.5)),
            ("f64", Value::Double(-2.25)),
            ("s", Value::from("héllo")),
            ("dt", Value::from("2024-01-01T00:00:00Z")),
        ]);

        let encoded = encode_properties(&properties, &columns).unwrap();
        let decoded = decode_properties(&encoded, &columns).unwrap();
        assert_eq!(decoded, properties);
    }

    #[test]
    fn test_type_mismatch() {
        let properties = props(vec![("id", Value::from("five"))]);
        let err = encode_properties(&properties, &id_name_columns()).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: ColumnType::Int,
                found: "String",
                ..
            }
        ));
    }

    #[test]
    fn test_tag_out_of_range_is_schema_error() {
        let data = [0x02, 0x00, 1, 0, 0, 0];
        let err = decode_properties(&data, &id_name_columns()).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema {
                tag: 2,
                column_count: 2
            }
        ));
    }

    #[test]
    fn test_truncated_value_is_format_error() {
        // Int needs 4 bytes, only 3 present
        let data = [0x00, 0x00, 1, 0, 0];
        assert!(matches!(
            decode_properties(&data, &id_name_columns()),
            Err(Error::Format(_))
        ));

        // Dangling single byte where a tag should start
        let data = [0x00, 0x00, 1, 0, 0, 0, 0x01];
        assert!(matches!(
            decode_properties(&data, &id_name_columns()),
            Err(Error::Format(_))
        ));

        // String length runs past the block
        let data = [0x01, 0x00, 10, 0, 0, 0, b'a'];
        assert!(matches!(
            decode_properties(&data, &id_name_columns()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_invalid_bool_and_utf8() {
        let columns = vec![
            ColumnMeta::new("flag", ColumnType::Bool),
            ColumnMeta::new("s", ColumnType::String),
        ];
        assert!(matches!(
            decode_properties(&[0x00, 0x00, 7], &columns),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            decode_properties(&[0x01, 0x00, 2, 0, 0, 0, 0xFF, 0xFE], &columns),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_empty_block_decodes_to_empty_properties() {
        let decoded = decode_properties(&[], &id_name_columns()).unwrap();
        assert!(decoded.is_empty());
    }
}
