//! Header Codec
//!
//! Writes and reads the magic bytes plus the length-prefixed header block.
//!
//! ## Header Block
//!
//! ```text
//! geometry_type    u8
//! flags            u8     bit0 has_z, bit1 has_m (never both on write)
//! features_count   u64 LE
//! index_node_size  u16 LE (0 = no index)
//! has_name         u8     then u32 LE length + UTF-8 when 1
//! column_count     u16 LE
//! per column       u32 LE name length + UTF-8 name + u8 type tag
//! ```
//!
//! The reader reports how many bytes it consumed so callers can compute where
//! the index and the data section begin.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use geostream_core::{ColumnMeta, ColumnType, Error, GeometryType, Header, Result};
use tracing::{debug, warn};

use super::{eof_as_format, MAGIC_BYTES, SIZE_PREFIX_LEN, VERSION};
use crate::config::ReadConfig;

const FLAG_Z: u8 = 0b01;
const FLAG_M: u8 = 0b10;

/// Encode magic bytes, block length and header block.
pub fn encode_header(header: &Header) -> Result<Bytes> {
    if header.has_z && header.has_m {
        return Err(Error::Format(
            "header cannot declare both Z and M dimensions".to_string(),
        ));
    }

    let mut block = BytesMut::new();
    block.put_u8(header.geometry_type as u8);

    let mut flags = 0u8;
    if header.has_z {
        flags |= FLAG_Z;
    }
    if header.has_m {
        flags |= FLAG_M;
    }
    block.put_u8(flags);
    block.put_u64_le(header.features_count);
    block.put_u16_le(header.index_node_size);

    match &header.name {
        Some(name) => {
            block.put_u8(1);
            put_string(&mut block, name, "layer name")?;
        }
        None => block.put_u8(0),
    }

    let column_count = u16::try_from(header.columns.len()).map_err(|_| {
        Error::Format(format!("{} columns exceed u16", header.columns.len()))
    })?;
    block.put_u16_le(column_count);
    for column in &header.columns {
        put_string(&mut block, &column.name, "column name")?;
        block.put_u8(column.column_type as u8);
    }

    let block_len = u32::try_from(block.len())
        .map_err(|_| Error::Format(format!("header block of {} bytes exceeds u32", block.len())))?;

    let mut buf = BytesMut::with_capacity(MAGIC_BYTES.len() + SIZE_PREFIX_LEN as usize + block.len());
    buf.put_slice(&MAGIC_BYTES);
    buf.put_u32_le(block_len);
    buf.put_slice(&block);
    Ok(buf.freeze())
}

fn put_string(buf: &mut BytesMut, value: &str, what: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| Error::Format(format!("{} exceeds u32 length", what)))?;
    buf.put_u32_le(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Write the header, returning the number of bytes written.
pub fn write_header<W: Write>(out: &mut W, header: &Header) -> Result<u64> {
    let bytes = encode_header(header)?;
    out.write_all(&bytes)?;

    debug!(
        geometry_type = ?header.geometry_type,
        columns = header.columns.len(),
        features_count = header.features_count,
        index_node_size = header.index_node_size,
        "Wrote stream header"
    );

    Ok(bytes.len() as u64)
}

/// Read and validate the header. Returns the header and the bytes consumed.
pub fn read_header<R: Read>(reader: &mut R, config: &ReadConfig) -> Result<(Header, u64)> {
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(eof_as_format("magic bytes"))?;
    check_magic(&magic)?;

    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(eof_as_format("header length"))?;
    let block_len = u32::from_le_bytes(len_buf) as usize;
    if block_len > config.max_header_size {
        return Err(Error::Format(format!(
            "header block of {} bytes exceeds limit of {}",
            block_len, config.max_header_size
        )));
    }

    let mut block = vec![0u8; block_len];
    reader
        .read_exact(&mut block)
        .map_err(eof_as_format("header block"))?;
    let header = decode_block(&block)?;

    if header.has_z && header.has_m {
        warn!("Header declares both Z and M, reading as XYZ");
    }

    debug!(
        geometry_type = ?header.geometry_type,
        columns = header.columns.len(),
        features_count = header.features_count,
        index_node_size = header.index_node_size,
        "Read stream header"
    );

    let consumed = MAGIC_BYTES.len() as u64 + SIZE_PREFIX_LEN + block_len as u64;
    Ok((header, consumed))
}

fn check_magic(magic: &[u8; 8]) -> Result<()> {
    if magic == &MAGIC_BYTES {
        return Ok(());
    }
    // Same frame, different version byte
    if magic[..3] == MAGIC_BYTES[..3] && magic[4..] == MAGIC_BYTES[4..] && magic[3] != VERSION {
        return Err(Error::UnsupportedVersion(magic[3]));
    }
    Err(Error::InvalidMagic)
}

fn decode_block(data: &[u8]) -> Result<Header> {
    let mut cursor = data;

    if cursor.remaining() < 1 + 1 + 8 + 2 + 1 {
        return Err(Error::truncated("header fields"));
    }
    let geometry_type = GeometryType::try_from(cursor.get_u8())?;
    let flags = cursor.get_u8();
    if flags & !(FLAG_Z | FLAG_M) != 0 {
        return Err(Error::Format(format!("unknown header flags {:#04x}", flags)));
    }
    let features_count = cursor.get_u64_le();
    let index_node_size = cursor.get_u16_le();

    let name = match cursor.get_u8() {
        0 => None,
        1 => Some(get_string(&mut cursor, "layer name")?),
        other => {
            return Err(Error::Format(format!("invalid layer name marker {}", other)));
        }
    };

    if cursor.remaining() < 2 {
        return Err(Error::truncated("column count"));
    }
    let column_count = cursor.get_u16_le() as usize;
    let mut columns = Vec::with_capacity(column_count.min(cursor.remaining()));
    for _ in 0..column_count {
        let name = get_string(&mut cursor, "column name")?;
        if cursor.remaining() < 1 {
            return Err(Error::truncated("column type"));
        }
        let column_type = ColumnType::try_from(cursor.get_u8())?;
        columns.push(ColumnMeta { name, column_type });
    }

    if cursor.has_remaining() {
        return Err(Error::Format(format!(
            "{} trailing bytes after header block",
            cursor.remaining()
        )));
    }

    Ok(Header {
        name,
        geometry_type,
        has_z: flags & FLAG_Z != 0,
        has_m: flags & FLAG_M != 0,
        columns,
        features_count,
        index_node_size,
    })
}

fn get_string(cursor: &mut &[u8], what: &str) -> Result<String> {
    if cursor.remaining() < 4 {
        return Err(Error::truncated(what));
    }
    let len = cursor.get_u32_le() as usize;
    if cursor.remaining() < len {
        return Err(Error::truncated(what));
    }
    let text = std::str::from_utf8(&cursor[..len])
        .map_err(|e| Error::Format(format!("invalid UTF-8 in {}: {}", what, e)))?
        .to_string();
    cursor.advance(len);
    Ok(text)
}
