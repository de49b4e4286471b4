//! Feature Framer
//!
//! Turns one feature into a size-prefixed record and back.
//!
//! ## Encoded Geometry
//!
//! ```text
//! geometry_type   u8
//! flags           u8        bit0 z present, bit1 m present
//! ends            u32 n  +  n * u32
//! xy              u32 n  +  n * f64   (interleaved x, y)
//! z               u32 n  +  n * f64   (only if bit0)
//! m               u32 n  +  n * f64   (only if bit1)
//! parts           u32 n  +  n * encoded geometry (same layout, recursive)
//! ```
//!
//! All integers and floats are little-endian. Children are written inline
//! before the parent's record ends, so one record is self-contained.
//!
//! ## Decoding
//!
//! Decoding happens in two steps. [`parse_record`] checks the structure and
//! yields a [`RawFeature`] (flat geometry buffers plus the raw attribute
//! slice). [`decode_feature`] then runs the attribute codec and the geometry
//! codec. Structural damage is always an error. A geometry the codec rejects
//! only costs that feature its geometry.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use geostream_core::{
    ColumnMeta, Dimensions, EncodedGeometry, Error, Feature, GeometryCodec, GeometryType, Header,
    Properties, Rect, Result,
};
use tracing::warn;

use crate::attributes::{decode_properties, encode_properties};

const HAS_GEOMETRY: u8 = 0b01;
const HAS_PROPERTIES: u8 = 0b10;

const GEOMETRY_Z: u8 = 0b01;
const GEOMETRY_M: u8 = 0b10;

/// Deepest accepted nesting of geometry parts
const MAX_GEOMETRY_DEPTH: usize = 32;

/// Smallest possible encoded geometry: type, flags and three empty arrays
const MIN_GEOMETRY_LEN: usize = 1 + 1 + 4 + 4 + 4;

/// Encode a feature as a size-prefixed record.
pub fn encode_feature<C: GeometryCodec>(
    feature: &Feature<C::Geometry>,
    geometry_type: GeometryType,
    dimensions: Dimensions,
    columns: &[ColumnMeta],
    codec: &C,
) -> Result<Bytes> {
    let (record, _) = encode_record(feature, geometry_type, dimensions, columns, codec)?;
    Ok(record)
}

/// Encode a feature, also returning the bounds of its geometry
pub(crate) fn encode_record<C: GeometryCodec>(
    feature: &Feature<C::Geometry>,
    geometry_type: GeometryType,
    dimensions: Dimensions,
    columns: &[ColumnMeta],
    codec: &C,
) -> Result<(Bytes, Option<Rect>)> {
    let mut body = BytesMut::new();
    let mut flags = 0u8;

    let mut bounds = None;
    if let Some(geometry) = &feature.geometry {
        let mut encoded = codec.encode(geometry, geometry_type, dimensions)?;
        if encoded.geometry_type == GeometryType::Unknown {
            encoded.geometry_type = match geometry_type {
                GeometryType::Unknown => codec.geometry_type(geometry),
                layer => layer,
            };
        }
        bounds = encoded.bounds();
        put_geometry(&mut body, &encoded)?;
        flags |= HAS_GEOMETRY;
    }

    if !columns.is_empty() && feature.has_properties() {
        let block = encode_properties(&feature.properties, columns)?;
        if !block.is_empty() {
            put_len(&mut body, block.len(), "attribute block")?;
            body.put_slice(&block);
            flags |= HAS_PROPERTIES;
        }
    }

    let body_len = body.len() + 1;
    let mut record = BytesMut::with_capacity(4 + body_len);
    put_len(&mut record, body_len, "record")?;
    record.put_u8(flags);
    record.put_slice(&body);

    Ok((record.freeze(), bounds))
}

fn put_len(buf: &mut BytesMut, len: usize, what: &str) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Format(format!("{} length {} exceeds u32", what, len)))?;
    buf.put_u32_le(len);
    Ok(())
}

fn put_geometry(buf: &mut BytesMut, geometry: &EncodedGeometry) -> Result<()> {
    buf.put_u8(geometry.geometry_type as u8);

    let mut flags = 0u8;
    if geometry.z.is_some() {
        flags |= GEOMETRY_Z;
    }
    if geometry.m.is_some() {
        flags |= GEOMETRY_M;
    }
    buf.put_u8(flags);

    put_len(buf, geometry.ends.len(), "ends")?;
    for end in &geometry.ends {
        buf.put_u32_le(*end);
    }
    put_f64s(buf, &geometry.xy, "xy")?;
    if let Some(z) = &geometry.z {
        put_f64s(buf, z, "z")?;
    }
    if let Some(m) = &geometry.m {
        put_f64s(buf, m, "m")?;
    }

    put_len(buf, geometry.parts.len(), "parts")?;
    for part in &geometry.parts {
        put_geometry(buf, part)?;
    }
    Ok(())
}

fn put_f64s(buf: &mut BytesMut, values: &[f64], what: &str) -> Result<()> {
    put_len(buf, values.len(), what)?;
    for v in values {
        buf.put_f64_le(*v);
    }
    Ok(())
}

/// Structurally parsed record body
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature<'a> {
    pub geometry: Option<EncodedGeometry>,

    /// Attribute block, not yet decoded
    pub properties: Option<&'a [u8]>,
}

/// Parse a record body (without its length prefix). The body must be consumed exactly.
pub fn parse_record(body: &[u8]) -> Result<RawFeature<'_>> {
    let mut cursor = body;

    if !cursor.has_remaining() {
        return Err(Error::truncated("record flags"));
    }
    let flags = cursor.get_u8();
    if flags & !(HAS_GEOMETRY | HAS_PROPERTIES) != 0 {
        return Err(Error::Format(format!("unknown record flags {:#04x}", flags)));
    }

    let geometry = if flags & HAS_GEOMETRY != 0 {
        Some(read_geometry(&mut cursor, 0)?)
    } else {
        None
    };

    let properties = if flags & HAS_PROPERTIES != 0 {
        let len = read_len(&mut cursor, "attribute block length")?;
        if cursor.remaining() < len {
            return Err(Error::truncated("attribute block"));
        }
        let (block, rest) = cursor.split_at(len);
        cursor = rest;
        Some(block)
    } else {
        None
    };

    if cursor.has_remaining() {
        return Err(Error::Format(format!(
            "{} trailing bytes after record body",
            cursor.remaining()
        )));
    }

    Ok(RawFeature {
        geometry,
        properties,
    })
}

fn read_len(cursor: &mut &[u8], what: &str) -> Result<usize> {
    if cursor.remaining() < 4 {
        return Err(Error::truncated(what));
    }
    Ok(cursor.get_u32_le() as usize)
}

/// Read a count, checking that `count * width` bytes are actually left
fn read_count(cursor: &mut &[u8], width: usize, what: &str) -> Result<usize> {
    let count = read_len(cursor, what)?;
    match count.checked_mul(width) {
        Some(needed) if needed <= cursor.remaining() => Ok(count),
        _ => Err(Error::truncated(what)),
    }
}

fn read_f64s(cursor: &mut &[u8], what: &str) -> Result<Vec<f64>> {
    let count = read_count(cursor, 8, what)?;
    Ok((0..count).map(|_| cursor.get_f64_le()).collect())
}

fn read_geometry(cursor: &mut &[u8], depth: usize) -> Result<EncodedGeometry> {
    if depth > MAX_GEOMETRY_DEPTH {
        return Err(Error::Format(format!(
            "geometry parts nested deeper than {}",
            MAX_GEOMETRY_DEPTH
        )));
    }
    if cursor.remaining() < 2 {
        return Err(Error::truncated("geometry header"));
    }
    let geometry_type = GeometryType::try_from(cursor.get_u8())?;
    let flags = cursor.get_u8();
    if flags & !(GEOMETRY_Z | GEOMETRY_M) != 0 {
        return Err(Error::Format(format!("unknown geometry flags {:#04x}", flags)));
    }

    let end_count = read_count(cursor, 4, "ends")?;
    let ends = (0..end_count).map(|_| cursor.get_u32_le()).collect();
    let xy = read_f64s(cursor, "xy")?;
    let z = if flags & GEOMETRY_Z != 0 {
        Some(read_f64s(cursor, "z")?)
    } else {
        None
    };
    let m = if flags & GEOMETRY_M != 0 {
        Some(read_f64s(cursor, "m")?)
    } else {
        None
    };

    let part_count = read_count(cursor, MIN_GEOMETRY_LEN, "parts")?;
    let mut parts = Vec::with_capacity(part_count);
    for _ in 0..part_count {
        parts.push(read_geometry(cursor, depth + 1)?);
    }

    Ok(EncodedGeometry {
        geometry_type,
        ends,
        xy,
        z,
        m,
        parts,
    })
}

/// Decode a record body into a feature.
///
/// Attribute errors propagate. A geometry the codec cannot rebuild is logged
/// and the feature is returned without one.
pub fn decode_feature<C: GeometryCodec>(
    body: &[u8],
    header: &Header,
    codec: &C,
) -> Result<Feature<C::Geometry>> {
    let raw = parse_record(body)?;

    let properties = match raw.properties {
        Some(block) => decode_properties(block, &header.columns)?,
        None => Properties::new(),
    };

    let geometry = match raw.geometry {
        Some(encoded) => match codec.decode(&encoded, header) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                warn!(
                    error = %e,
                    geometry_type = ?encoded.geometry_type,
                    "Geometry failed to decode, keeping feature without geometry"
                );
                None
            }
        },
        None => None,
    };

    Ok(Feature::with_properties(geometry, properties))
}
