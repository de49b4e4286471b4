//! Stream Writers
//!
//! Two ways to produce a GeoStream:
//!
//! ### Single Pass
//! [`write_header`](super::write_header) once, then [`write_feature`] per
//! feature. Nothing is buffered and no index is written. [`serialize`] and
//! [`serialize_to`] wrap this for a slice of features.
//!
//! ### Indexed
//! [`FeatureWriter`] encodes every added feature immediately but holds the
//! records until [`FeatureWriter::finish`]. Finishing:
//!
//! 1. Sorts records along a Hilbert curve over the layer extent
//! 2. Builds a packed R-tree whose leaves point at each record's byte offset
//! 3. Writes header (with feature count and node size), index, then records
//!
//! A feature without geometry has no bounds and cannot be indexed. If any
//! such feature was added, the stream is written without an index in
//! insertion order.
//!
//! ## Example
//! ```ignore
//! let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, columns, WriteConfig::default());
//! for feature in &features {
//!     writer.add(feature)?;
//! }
//! let header = writer.finish(&mut File::create("points.gst")?)?;
//! ```

use std::io::Write;

use bytes::Bytes;
use geostream_core::{
    infer_columns, ColumnMeta, Dimensions, Feature, GeoTypesCodec, GeometryCodec, GeometryType,
    Header, Rect, Result,
};
use tracing::{debug, warn};

use super::header::write_header;
use super::record::encode_record;
use crate::config::WriteConfig;
use crate::index::{hilbert_sort, NodeItem, PackedRTree};

/// Encode one feature and append it. Returns the bytes written.
pub fn write_feature<W: Write>(
    out: &mut W,
    feature: &Feature,
    geometry_type: GeometryType,
    dimensions: Dimensions,
    columns: &[ColumnMeta],
) -> Result<u64> {
    let (record, _) = encode_record(feature, geometry_type, dimensions, columns, &GeoTypesCodec)?;
    out.write_all(&record)?;
    Ok(record.len() as u64)
}

/// Serialize features into a new buffer. See [`serialize_to`].
pub fn serialize(
    features: &[Feature],
    geometry_type: GeometryType,
    dimensions: Dimensions,
    columns: Option<Vec<ColumnMeta>>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    serialize_to(&mut out, features, geometry_type, dimensions, columns)?;
    Ok(out)
}

/// Write header and records without an index.
///
/// Columns are inferred from the first feature when not given.
pub fn serialize_to<W: Write>(
    out: &mut W,
    features: &[Feature],
    geometry_type: GeometryType,
    dimensions: Dimensions,
    columns: Option<Vec<ColumnMeta>>,
) -> Result<Header> {
    let columns = match (columns, features.first()) {
        (Some(columns), _) => columns,
        (None, Some(first)) => infer_columns(first)?,
        (None, None) => Vec::new(),
    };

    let mut header = Header::new(geometry_type, dimensions, columns);
    header.features_count = features.len() as u64;
    write_header(out, &header)?;

    for feature in features {
        write_feature(out, feature, geometry_type, dimensions, &header.columns)?;
    }
    Ok(header)
}

struct PendingRecord {
    bytes: Bytes,
    bounds: Option<Rect>,
}

/// Buffers encoded records and writes them with a packed R-tree on finish.
pub struct FeatureWriter<C: GeometryCodec = GeoTypesCodec> {
    codec: C,
    header: Header,
    index_node_size: u16,
    records: Vec<PendingRecord>,
    extent: Rect,
    unbounded: usize,
}

impl FeatureWriter {
    pub fn new(
        geometry_type: GeometryType,
        dimensions: Dimensions,
        columns: Vec<ColumnMeta>,
        config: WriteConfig,
    ) -> Self {
        Self::with_codec(GeoTypesCodec, geometry_type, dimensions, columns, config)
    }
}

impl<C: GeometryCodec> FeatureWriter<C> {
    pub fn with_codec(
        codec: C,
        geometry_type: GeometryType,
        dimensions: Dimensions,
        columns: Vec<ColumnMeta>,
        config: WriteConfig,
    ) -> Self {
        let mut header = Header::new(geometry_type, dimensions, columns);
        header.name = config.layer_name;

        Self {
            codec,
            header,
            index_node_size: config.index_node_size,
            records: Vec::new(),
            extent: Rect::empty(),
            unbounded: 0,
        }
    }

    /// Encode a feature and hold it until `finish`.
    pub fn add(&mut self, feature: &Feature<C::Geometry>) -> Result<()> {
        let (bytes, bounds) = encode_record(
            feature,
            self.header.geometry_type,
            self.header.dimensions(),
            &self.header.columns,
            &self.codec,
        )?;

        match &bounds {
            Some(rect) => self.extent.expand(rect),
            None => self.unbounded += 1,
        }
        self.records.push(PendingRecord { bytes, bounds });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bounds of everything added so far, `None` before the first bounded feature
    pub fn extent(&self) -> Option<Rect> {
        if self.extent.is_empty() {
            None
        } else {
            Some(self.extent)
        }
    }

    /// Write header, index and records. Returns the header as written.
    pub fn finish<W: Write>(self, out: &mut W) -> Result<Header> {
        let mut header = self.header;
        header.features_count = self.records.len() as u64;

        let wants_index = self.index_node_size > 0 && !self.records.is_empty();
        if wants_index && self.unbounded > 0 {
            warn!(
                unbounded = self.unbounded,
                features_count = header.features_count,
                "Features without bounds, writing stream without spatial index"
            );
        }

        if !wants_index || self.unbounded > 0 {
            header.index_node_size = 0;
            write_header(out, &header)?;
            for record in &self.records {
                out.write_all(&record.bytes)?;
            }
            debug!(features_count = header.features_count, "Finished stream without index");
            return Ok(header);
        }

        let mut records: Vec<(Rect, Bytes)> = self
            .records
            .into_iter()
            .filter_map(|record| record.bounds.map(|rect| (rect, record.bytes)))
            .collect();
        hilbert_sort(&mut records, &self.extent, |(rect, _)| *rect);

        let mut items = Vec::with_capacity(records.len());
        let mut offset = 0u64;
        for (rect, bytes) in &records {
            items.push(NodeItem::new(*rect, offset));
            offset += bytes.len() as u64;
        }
        let tree = PackedRTree::build(&items, self.extent, self.index_node_size)?;

        header.index_node_size = self.index_node_size;
        write_header(out, &header)?;
        tree.write_to(out)?;
        for (_, bytes) in &records {
            out.write_all(bytes)?;
        }

        debug!(
            features_count = header.features_count,
            index_bytes = tree.size(),
            data_bytes = offset,
            "Finished indexed stream"
        );
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::reader::{deserialize_bytes, FeatureReader};
    use geo_types::{point, Geometry};
    use geostream_core::{ColumnType, Error, Value};
    use std::io::Cursor;

    fn grid(n: usize) -> Vec<Feature> {
        (0..n * n)
            .map(|i| {
                let (x, y) = ((i % n) as f64, (i / n) as f64);
                Feature::new(Some(Geometry::Point(point!(x: x, y: y)))).with_property("id", i as u32)
            })
            .collect()
    }

    fn columns() -> Vec<ColumnMeta> {
        vec![ColumnMeta::new("id", ColumnType::UInt)]
    }

    #[test]
    fn test_serialize_infers_columns() {
        let features = vec![Feature::new(None)
            .with_property("name", "a")
            .with_property("n", 1.5f64)];
        let bytes = serialize(&features, GeometryType::Unknown, Dimensions::Xy, None).unwrap();

        let reader = FeatureReader::open(Cursor::new(&bytes[..])).unwrap();
        let header = reader.header();
        assert_eq!(header.features_count, 1);
        assert_eq!(header.columns[0], ColumnMeta::new("name", ColumnType::String));
        assert_eq!(header.columns[1], ColumnMeta::new("n", ColumnType::Double));
        assert!(!header.has_index());
    }

    #[test]
    fn test_serialize_rejects_both_dimension_flags_via_header() {
        let mut out = Vec::new();
        let mut header = Header::new(GeometryType::Point, Dimensions::Xy, vec![]);
        header.has_z = true;
        header.has_m = true;
        assert!(matches!(write_header(&mut out, &header), Err(Error::Format(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_indexed_writer_roundtrip_reorders() {
        let features = grid(10);
        let mut writer = FeatureWriter::new(
            GeometryType::Point,
            Dimensions::Xy,
            columns(),
            WriteConfig::default(),
        );
        for feature in &features {
            writer.add(feature).unwrap();
        }
        assert_eq!(writer.len(), 100);
        assert_eq!(writer.extent(), Some(Rect::new(0.0, 0.0, 9.0, 9.0)));

        let mut out = Vec::new();
        let header = writer.finish(&mut out).unwrap();
        assert_eq!(header.features_count, 100);
        assert_eq!(header.index_node_size, 16);

        let mut decoded = deserialize_bytes(&out).unwrap();
        assert_eq!(decoded.len(), 100);
        decoded.sort_by_key(|f| match f.property("id") {
            Some(Value::UInt(id)) => *id,
            _ => u32::MAX,
        });
        assert_eq!(decoded, features);
    }

    #[test]
    fn test_unbounded_feature_disables_index() {
        let mut writer = FeatureWriter::new(
            GeometryType::Point,
            Dimensions::Xy,
            columns(),
            WriteConfig::default(),
        );
        writer
            .add(&Feature::new(Some(Geometry::Point(point!(x: 1.0, y: 1.0)))).with_property("id", 0u32))
            .unwrap();
        writer.add(&Feature::new(None).with_property("id", 1u32)).unwrap();

        let mut out = Vec::new();
        let header = writer.finish(&mut out).unwrap();
        assert_eq!(header.index_node_size, 0);

        let decoded = deserialize_bytes(&out).unwrap();
        assert_eq!(decoded[1].property("id"), Some(&Value::UInt(1)));
        assert!(decoded[1].geometry.is_none());
    }

    #[test]
    fn test_layer_name_and_disabled_index() {
        let config = WriteConfig {
            index_node_size: 0,
            layer_name: Some("grid".to_string()),
        };
        let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, columns(), config);
        for feature in grid(2) {
            writer.add(&feature).unwrap();
        }
        let mut out = Vec::new();
        let header = writer.finish(&mut out).unwrap();
        assert_eq!(header.name.as_deref(), Some("grid"));
        assert!(!header.has_index());
        assert_eq!(deserialize_bytes(&out).unwrap(), grid(2));
    }

    #[test]
    fn test_node_size_one_rejected() {
        let config = WriteConfig {
            index_node_size: 1,
            layer_name: None,
        };
        let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, columns(), config);
        writer.add(&grid(1)[0]).unwrap();
        assert!(matches!(writer.finish(&mut Vec::new()), Err(Error::Index(_))));
    }

    #[test]
    fn test_empty_indexed_writer() {
        let writer = FeatureWriter::new(
            GeometryType::Polygon,
            Dimensions::Xy,
            columns(),
            WriteConfig::default(),
        );
        assert!(writer.is_empty());
        let mut out = Vec::new();
        let header = writer.finish(&mut out).unwrap();
        assert_eq!(header.features_count, 0);
        assert!(deserialize_bytes(&out).unwrap().is_empty());
    }
}
