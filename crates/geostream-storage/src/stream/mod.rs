//! GeoStream Binary Format
//!
//! This module implements the single-file, append-only format for a layer of
//! vector features: one header, an optional spatial index, then the records.
//!
//! ## Stream Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Magic bytes: "gst" VERSION "gst" 0 (8 bytes)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Header length (u32 LE)                                      │
//! │ Header block                                                │
//! │ - Geometry type (1 byte)                                    │
//! │ - Flags: bit0 has_z, bit1 has_m (1 byte)                    │
//! │ - Features count (8 bytes)                                  │
//! │ - Index node size, 0 = no index (2 bytes)                   │
//! │ - Layer name (optional)                                     │
//! │ - Columns: count, then name + type tag each                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Packed R-tree (only when index node size > 0)               │
//! │ - calc_size(features count, node size) bytes                │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record 1: length (u32 LE) + body                            │
//! │ Record 2: length (u32 LE) + body                            │
//! │ ...                                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Body
//!
//! ```text
//! flags (u8)          bit0 geometry present, bit1 properties present
//! geometry            if bit0, see [`record`]
//! properties          if bit1: u32 LE length + attribute block
//! ```
//!
//! ## Reading
//!
//! The header is read once per session. A full scan skips the index block and
//! walks records until the end of the stream. An index scan asks the spatial
//! index for matching record offsets and seeks to each one. Both yield lazily
//! and stop after the first fatal error.
//!
//! ## Usage
//!
//! ### Writing a Stream
//! ```ignore
//! let bytes = serialize(&features, GeometryType::Point, Dimensions::Xy, None)?;
//! ```
//!
//! ### Reading a Stream
//! ```ignore
//! let reader = FeatureReader::open(File::open("parcels.gst")?)?;
//! for feature in reader.select_bbox(Rect::new(0.0, 0.0, 10.0, 10.0))? {
//!     let feature = feature?;
//!     println!("{:?}", feature.properties);
//! }
//! ```

pub mod header;
pub mod reader;
pub mod record;
pub mod writer;

pub use header::{encode_header, read_header, write_header};
pub use reader::{deserialize, deserialize_bytes, FeatureReader, Features};
pub use record::{decode_feature, encode_feature, parse_record, RawFeature};
pub use writer::{serialize, serialize_to, write_feature, FeatureWriter};

use geostream_core::Error;

/// Format version stored in the magic bytes
pub const VERSION: u8 = 1;

/// Magic bytes opening every stream
pub const MAGIC_BYTES: [u8; 8] = [b'g', b's', b't', VERSION, b'g', b's', b't', 0];

/// Length prefix size of the header block and of every record
pub const SIZE_PREFIX_LEN: u64 = 4;

/// Map an early end of stream to a format error naming what was being read.
pub(crate) fn eof_as_format(what: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::truncated(what),
        _ => Error::Io(e),
    }
}
