//! Stream Schema Model
//!
//! Pure data describing one GeoStream: the column list shared by every feature,
//! the geometry type and dimensionality, and the stream header that carries
//! them.
//!
//! ## Tag Indexes
//! A column's position in [`Header::columns`] is its **tag index**. Encoded
//! attribute entries carry the tag index instead of the column name, so the
//! column list must never be reordered once records have been written
//! against it.
//!
//! ## Dimensions
//! Only three layouts exist: XY, XYZ and XYM. The header stores them as two
//! flags (`has_z`, `has_m`) which the writer never sets together. A reader that
//! meets both flags normalizes to XYZ (see [`Header::dimensions`]).

use serde::{Deserialize, Serialize};

use crate::feature::Feature;
use crate::{Error, Result};

/// Attribute column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    Byte = 0,
    UByte = 1,
    Bool = 2,
    Short = 3,
    UShort = 4,
    Int = 5,
    UInt = 6,
    Long = 7,
    ULong = 8,
    Float = 9,
    Double = 10,
    String = 11,
    /// Stored like `String`, decoded as a string value.
    DateTime = 12,
}

impl ColumnType {
    /// Fixed encoded width in bytes, `None` for length-prefixed types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Bool | ColumnType::Byte | ColumnType::UByte => Some(1),
            ColumnType::Short | ColumnType::UShort => Some(2),
            ColumnType::Int | ColumnType::UInt | ColumnType::Float => Some(4),
            ColumnType::Long | ColumnType::ULong | ColumnType::Double => Some(8),
            ColumnType::String | ColumnType::DateTime => None,
        }
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ColumnType::Byte),
            1 => Ok(ColumnType::UByte),
            2 => Ok(ColumnType::Bool),
            3 => Ok(ColumnType::Short),
            4 => Ok(ColumnType::UShort),
            5 => Ok(ColumnType::Int),
            6 => Ok(ColumnType::UInt),
            7 => Ok(ColumnType::Long),
            8 => Ok(ColumnType::ULong),
            9 => Ok(ColumnType::Float),
            10 => Ok(ColumnType::Double),
            11 => Ok(ColumnType::String),
            12 => Ok(ColumnType::DateTime),
            _ => Err(Error::UnsupportedType(format!("column type tag {}", value))),
        }
    }
}

/// A named, typed attribute column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Geometry type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    /// Mixed layer; each feature carries its own type.
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl TryFrom<u8> for GeometryType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(GeometryType::Unknown),
            1 => Ok(GeometryType::Point),
            2 => Ok(GeometryType::LineString),
            3 => Ok(GeometryType::Polygon),
            4 => Ok(GeometryType::MultiPoint),
            5 => Ok(GeometryType::MultiLineString),
            6 => Ok(GeometryType::MultiPolygon),
            7 => Ok(GeometryType::GeometryCollection),
            _ => Err(Error::Format(format!("invalid geometry type tag {}", value))),
        }
    }
}

/// Coordinate dimensionality of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Dimensions {
    #[default]
    Xy = 2,
    Xyz = 3,
    /// Planar plus measure. Z is absent.
    Xym = 4,
}

impl Dimensions {
    pub fn has_z(self) -> bool {
        self == Dimensions::Xyz
    }

    pub fn has_m(self) -> bool {
        self == Dimensions::Xym
    }
}

impl TryFrom<u8> for Dimensions {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(Dimensions::Xy),
            3 => Ok(Dimensions::Xyz),
            4 => Ok(Dimensions::Xym),
            _ => Err(Error::Format(format!("invalid dimensions {}", value))),
        }
    }
}

/// Stream header (layer metadata)
///
/// Written once before any record and read once at the start of every read
/// session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Optional layer name
    pub name: Option<String>,

    pub geometry_type: GeometryType,

    pub has_z: bool,

    pub has_m: bool,

    /// Ordered column list; position = tag index
    pub columns: Vec<ColumnMeta>,

    /// Number of records, 0 when unknown at write time
    pub features_count: u64,

    /// Packed index node size, 0 = no index follows the header
    pub index_node_size: u16,
}

impl Header {
    pub fn new(geometry_type: GeometryType, dimensions: Dimensions, columns: Vec<ColumnMeta>) -> Self {
        Self {
            name: None,
            geometry_type,
            has_z: dimensions.has_z(),
            has_m: dimensions.has_m(),
            columns,
            features_count: 0,
            index_node_size: 0,
        }
    }

    /// Resolve the two dimension flags. Z wins when a malformed header sets both.
    pub fn dimensions(&self) -> Dimensions {
        if self.has_z {
            Dimensions::Xyz
        } else if self.has_m {
            Dimensions::Xym
        } else {
            Dimensions::Xy
        }
    }

    pub fn has_index(&self) -> bool {
        self.index_node_size > 0
    }

    /// Find a column's tag index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Derive a column list from one feature's properties, in property order.
///
/// Intended as an explicit pre-pass before the first feature is written. A
/// `Null` value carries no type and is rejected.
pub fn infer_columns<G>(feature: &Feature<G>) -> Result<Vec<ColumnMeta>> {
    feature
        .properties
        .iter()
        .map(|(name, value)| {
            let column_type = value.column_type().ok_or_else(|| {
                Error::UnsupportedType(format!("cannot infer column type of null property '{}'", name))
            })?;
            Ok(ColumnMeta::new(name.clone(), column_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_column_type_tag_roundtrip() {
        for tag in 0u8..=12 {
            let column_type = ColumnType::try_from(tag).unwrap();
            assert_eq!(column_type as u8, tag);
        }
        assert!(matches!(
            ColumnType::try_from(13),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_header_dimension_flags() {
        let header = Header::new(GeometryType::Point, Dimensions::Xyz, vec![]);
        assert!(header.has_z);
        assert!(!header.has_m);
        assert_eq!(header.dimensions(), Dimensions::Xyz);

        let header = Header::new(GeometryType::Point, Dimensions::Xym, vec![]);
        assert!(!header.has_z);
        assert!(header.has_m);
        assert_eq!(header.dimensions(), Dimensions::Xym);

        let header = Header::new(GeometryType::Point, Dimensions::Xy, vec![]);
        assert!(!header.has_z && !header.has_m);
        assert_eq!(header.dimensions(), Dimensions::Xy);
    }

    #[test]
    fn test_header_both_flags_normalizes_to_z() {
        let header = Header {
            has_z: true,
            has_m: true,
            ..Default::default()
        };
        assert_eq!(header.dimensions(), Dimensions::Xyz);
    }

    #[test]
    fn test_infer_columns_preserves_order() {
        let feature: Feature = Feature::new(None)
            .with_property("name", "a")
            .with_property("id", 5i32)
            .with_property("ok", true);

        let columns = infer_columns(&feature).unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnMeta::new("name", ColumnType::String),
                ColumnMeta::new("id", ColumnType::Int),
                ColumnMeta::new("ok", ColumnType::Bool),
            ]
        );
    }

    #[test]
    fn test_infer_columns_rejects_null() {
        let feature: Feature = Feature::new(None).with_property("x", Value::Null);
        assert!(matches!(
            infer_columns(&feature),
            Err(Error::UnsupportedType(_))
        ));
    }
}
