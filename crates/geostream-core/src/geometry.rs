//! Geometry Encoding Seam
//!
//! The feature codec doesn't know how shapes are flattened. It talks to a
//! [`GeometryCodec`], which turns a geometry into an [`EncodedGeometry`] (flat
//! coordinate buffers) and back.
//!
//! ## EncodedGeometry
//! - **xy**: interleaved planar coordinates `[x0, y0, x1, y1, ...]`
//! - **ends**: cumulative coordinate counts closing each ring/line; empty when
//!   the geometry is a single run of coordinates
//! - **z / m**: optional per-coordinate ordinates
//! - **parts**: child geometries for multi-part shapes (multi-polygons,
//!   collections). A geometry with parts holds no coordinates of its own.
//!
//! ## GeoTypesCodec
//! The default codec for `geo_types::Geometry<f64>`. geo-types is planar, so it
//! never produces Z or M buffers and ignores them on decode.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::schema::{Dimensions, GeometryType, Header};

/// Axis-aligned bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle that contains nothing; expanding it by any rect yields that rect.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn expand(&mut self, other: &Rect) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Bounds of interleaved xy coordinates, `None` if there are none
    pub fn from_xy(xy: &[f64]) -> Option<Rect> {
        let mut rect = Rect::empty();
        for pair in xy.chunks_exact(2) {
            rect.expand(&Rect::new(pair[0], pair[1], pair[0], pair[1]));
        }
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }
}

/// Flat coordinate buffers of one geometry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodedGeometry {
    pub geometry_type: GeometryType,
    pub ends: Vec<u32>,
    pub xy: Vec<f64>,
    pub z: Option<Vec<f64>>,
    pub m: Option<Vec<f64>>,
    pub parts: Vec<EncodedGeometry>,
}

impl EncodedGeometry {
    pub fn new(geometry_type: GeometryType) -> Self {
        Self {
            geometry_type,
            ..Default::default()
        }
    }

    /// Multi-part geometry holding only children
    pub fn with_parts(geometry_type: GeometryType, parts: Vec<EncodedGeometry>) -> Self {
        Self {
            geometry_type,
            parts,
            ..Default::default()
        }
    }

    /// Bounds over own coordinates and all parts
    pub fn bounds(&self) -> Option<Rect> {
        let mut rect = Rect::empty();
        if let Some(own) = Rect::from_xy(&self.xy) {
            rect.expand(&own);
        }
        for part in &self.parts {
            if let Some(child) = part.bounds() {
                rect.expand(&child);
            }
        }
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }
}

/// Converts geometries to and from flat coordinate buffers
pub trait GeometryCodec {
    type Geometry;

    /// Type tag of a geometry, used when a layer is declared `Unknown`
    fn geometry_type(&self, geometry: &Self::Geometry) -> GeometryType;

    fn encode(
        &self,
        geometry: &Self::Geometry,
        geometry_type: GeometryType,
        dimensions: Dimensions,
    ) -> Result<EncodedGeometry, GeometryError>;

    /// Rebuild a geometry. The header supplies layer type and dimensionality.
    fn decode(
        &self,
        encoded: &EncodedGeometry,
        header: &Header,
    ) -> Result<Self::Geometry, GeometryError>;
}

/// `GeometryCodec` for `geo_types::Geometry<f64>`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTypesCodec;

mod geo_impl {
    use geo_types::{
        Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
        MultiPolygon, Point, Polygon,
    };

    use super::*;

    fn push_coords(encoded: &mut EncodedGeometry, coords: impl Iterator<Item = Coord<f64>>) {
        for c in coords {
            encoded.xy.push(c.x);
            encoded.xy.push(c.y);
        }
    }

    fn close_run(encoded: &mut EncodedGeometry) {
        encoded.ends.push((encoded.xy.len() / 2) as u32);
    }

    fn encode_polygon(polygon: &Polygon<f64>) -> EncodedGeometry {
        let mut encoded = EncodedGeometry::new(GeometryType::Polygon);
        push_coords(&mut encoded, polygon.exterior().coords().copied());
        close_run(&mut encoded);
        for ring in polygon.interiors() {
            push_coords(&mut encoded, ring.coords().copied());
            close_run(&mut encoded);
        }
        encoded
    }

    pub(super) fn type_of(geometry: &Geometry<f64>) -> GeometryType {
        match geometry {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    pub(super) fn encode(geometry: &Geometry<f64>) -> EncodedGeometry {
        match geometry {
            Geometry::Point(p) => {
                let mut encoded = EncodedGeometry::new(GeometryType::Point);
                push_coords(&mut encoded, std::iter::once(p.0));
                encoded
            }
            Geometry::Line(line) => {
                let mut encoded = EncodedGeometry::new(GeometryType::LineString);
                push_coords(&mut encoded, [line.start, line.end].into_iter());
                encoded
            }
            Geometry::LineString(ls) => {
                let mut encoded = EncodedGeometry::new(GeometryType::LineString);
                push_coords(&mut encoded, ls.coords().copied());
                encoded
            }
            Geometry::Polygon(polygon) => encode_polygon(polygon),
            Geometry::Rect(rect) => encode_polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => encode_polygon(&triangle.to_polygon()),
            Geometry::MultiPoint(mp) => {
                let mut encoded = EncodedGeometry::new(GeometryType::MultiPoint);
                push_coords(&mut encoded, mp.iter().map(|p| p.0));
                encoded
            }
            Geometry::MultiLineString(mls) => {
                let mut encoded = EncodedGeometry::new(GeometryType::MultiLineString);
                for ls in mls.iter() {
                    push_coords(&mut encoded, ls.coords().copied());
                    close_run(&mut encoded);
                }
                encoded
            }
            Geometry::MultiPolygon(mp) => EncodedGeometry::with_parts(
                GeometryType::MultiPolygon,
                mp.iter().map(encode_polygon).collect(),
            ),
            Geometry::GeometryCollection(gc) => EncodedGeometry::with_parts(
                GeometryType::GeometryCollection,
                gc.iter().map(encode).collect(),
            ),
        }
    }

    fn coords(xy: &[f64]) -> Result<Vec<Coord<f64>>, GeometryError> {
        if xy.len() % 2 != 0 {
            return Err(GeometryError::Malformed(format!(
                "odd coordinate buffer length {}",
                xy.len()
            )));
        }
        Ok(xy
            .chunks_exact(2)
            .map(|pair| Coord {
                x: pair[0],
                y: pair[1],
            })
            .collect())
    }

    /// Split coordinates into runs at each end. No ends means one run.
    fn runs(encoded: &EncodedGeometry) -> Result<Vec<LineString<f64>>, GeometryError> {
        let all = coords(&encoded.xy)?;
        if encoded.ends.is_empty() {
            return Ok(vec![LineString::new(all)]);
        }

        let mut runs = Vec::with_capacity(encoded.ends.len());
        let mut start = 0usize;
        for &end in &encoded.ends {
            let end = end as usize;
            if end < start || end > all.len() {
                return Err(GeometryError::Malformed(format!(
                    "end {} out of range ({}..={})",
                    end,
                    start,
                    all.len()
                )));
            }
            runs.push(LineString::new(all[start..end].to_vec()));
            start = end;
        }
        if start != all.len() {
            return Err(GeometryError::Malformed(format!(
                "{} coordinates not covered by ends",
                all.len() - start
            )));
        }
        Ok(runs)
    }

    fn decode_polygon(encoded: &EncodedGeometry) -> Result<Polygon<f64>, GeometryError> {
        let mut rings = runs(encoded)?.into_iter();
        let exterior = rings
            .next()
            .ok_or_else(|| GeometryError::Malformed("polygon without rings".to_string()))?;
        Ok(Polygon::new(exterior, rings.collect()))
    }

    pub(super) fn decode(
        encoded: &EncodedGeometry,
        layer_type: GeometryType,
    ) -> Result<Geometry<f64>, GeometryError> {
        let geometry_type = match encoded.geometry_type {
            GeometryType::Unknown => layer_type,
            other => other,
        };

        match geometry_type {
            GeometryType::Point => {
                let c = coords(&encoded.xy)?;
                match c.as_slice() {
                    [single] => Ok(Geometry::Point(Point(*single))),
                    _ => Err(GeometryError::Malformed(format!(
                        "point with {} coordinates",
                        c.len()
                    ))),
                }
            }
            GeometryType::MultiPoint => Ok(Geometry::MultiPoint(MultiPoint::new(
                coords(&encoded.xy)?.into_iter().map(Point).collect(),
            ))),
            GeometryType::LineString => {
                Ok(Geometry::LineString(LineString::new(coords(&encoded.xy)?)))
            }
            GeometryType::MultiLineString => {
                // No lines at all, not one empty line
                if encoded.ends.is_empty() && encoded.xy.is_empty() {
                    return Ok(Geometry::MultiLineString(MultiLineString::new(vec![])));
                }
                Ok(Geometry::MultiLineString(MultiLineString::new(runs(encoded)?)))
            }
            GeometryType::Polygon => Ok(Geometry::Polygon(decode_polygon(encoded)?)),
            GeometryType::MultiPolygon => {
                let polygons = encoded
                    .parts
                    .iter()
                    .map(decode_polygon)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            GeometryType::GeometryCollection => {
                let geometries = encoded
                    .parts
                    .iter()
                    .map(|part| decode(part, GeometryType::Unknown))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::GeometryCollection(GeometryCollection::new_from(
                    geometries,
                )))
            }
            GeometryType::Unknown => Err(GeometryError::UnsupportedType(
                "geometry type unknown in both record and header".to_string(),
            )),
        }
    }
}

impl GeometryCodec for GeoTypesCodec {
    type Geometry = geo_types::Geometry<f64>;

    fn geometry_type(&self, geometry: &Self::Geometry) -> GeometryType {
        geo_impl::type_of(geometry)
    }

    fn encode(
        &self,
        geometry: &Self::Geometry,
        geometry_type: GeometryType,
        _dimensions: Dimensions,
    ) -> Result<EncodedGeometry, GeometryError> {
        let actual = geo_impl::type_of(geometry);
        if geometry_type != GeometryType::Unknown && geometry_type != actual {
            return Err(GeometryError::UnsupportedType(format!(
                "{:?} geometry in a {:?} layer",
                actual, geometry_type
            )));
        }
        Ok(geo_impl::encode(geometry))
    }

    fn decode(
        &self,
        encoded: &EncodedGeometry,
        header: &Header,
    ) -> Result<Self::Geometry, GeometryError> {
        geo_impl::decode(encoded, header.geometry_type)
    }
}
