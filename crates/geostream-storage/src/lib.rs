//! GeoStream Storage Layer
//!
//! This crate implements the byte level of GeoStream: turning features into a
//! single append-only stream and reading them back, optionally through a
//! packed spatial index.
//!
//! ## What is the Storage Layer?
//!
//! It sits between callers holding [`Feature`](geostream_core::Feature)s and
//! any `Write` / `Read + Seek` byte stream. It handles:
//!
//! 1. **Attribute encoding**: sparse, tag-indexed property blocks
//! 2. **Record framing**: size-prefixed records with geometry buffers
//! 3. **Header**: magic bytes, layer metadata and the column list
//! 4. **Spatial indexing**: a packed Hilbert R-tree for rectangle queries
//! 5. **Reading**: lazy full scans and index scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐
//! │   Features   │
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────────────┐
//! │ write_feature /      │
//! │ FeatureWriter        │
//! │ - Attribute codec    │
//! │ - Geometry codec     │
//! │ - Packed R-tree      │
//! └──────────┬───────────┘
//!            │ header | index | records
//!            ▼
//! ┌──────────────────────┐
//! │  File / Vec<u8> /    │
//! │  any Write + Seek    │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ FeatureReader        │
//! │ - Header check       │
//! │ - Full / index scan  │
//! │ - Lazy decode        │
//! └──────────┬───────────┘
//!            │ Result<Feature>
//!            ▼
//! ┌──────────────┐
//! │   Callers    │
//! └──────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### FeatureWriter
//! Buffers encoded records, sorts them along a Hilbert curve and writes the
//! stream with a packed R-tree in front of the data. For single-pass output
//! without an index use [`write_header`] + [`write_feature`] or [`serialize`].
//!
//! ### FeatureReader
//! Reads the header once, then hands out a [`Features`] iterator that either
//! walks every record or only the ones the index reports for a rectangle.
//!
//! ## Usage Example
//!
//! ### Writing
//! ```ignore
//! use geostream_storage::{FeatureWriter, WriteConfig};
//! use geostream_core::{Dimensions, GeometryType};
//!
//! let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, columns, WriteConfig::default());
//! for feature in &features {
//!     writer.add(feature)?;
//! }
//! writer.finish(&mut File::create("cities.gst")?)?;
//! ```
//!
//! ### Reading a Rectangle
//! ```ignore
//! use geostream_storage::FeatureReader;
//! use geostream_core::Rect;
//!
//! let reader = FeatureReader::open(BufReader::new(File::open("cities.gst")?))?;
//! for feature in reader.select_bbox(Rect::new(-10.0, 35.0, 30.0, 60.0))? {
//!     println!("{:?}", feature?.property("name"));
//! }
//! ```
//!
//! ## Design Decisions
//!
//! ### Sparse Attributes
//! - Each entry carries its column's tag index, so absent values cost nothing
//! - Entries follow column order, so encoding is deterministic
//!
//! ### Geometry Failures Are Per Feature
//! - A shape the codec cannot rebuild drops only that feature's geometry
//! - Damaged framing or attributes end the read session

pub mod attributes;
pub mod config;
pub mod index;
pub mod stream;

pub use attributes::{decode_properties, encode_properties};
pub use config::{ReadConfig, WriteConfig};
pub use index::{FeatureRange, PackedIndex, PackedRTree, SpatialIndex};
pub use stream::{
    decode_feature, deserialize, deserialize_bytes, encode_feature, encode_header, parse_record,
    read_header, serialize, serialize_to, write_feature, write_header, FeatureReader,
    FeatureWriter, Features, RawFeature, MAGIC_BYTES, VERSION,
};
