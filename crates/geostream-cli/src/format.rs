//! Output formatting for geoctl
//!
//! - `info`: the header as pretty JSON
//! - `dump`: one JSON object per line, geometry rendered as WKT

use std::io::Write;

use anyhow::Result;
use geo_types::Geometry;
use geostream_core::{ColumnMeta, Dimensions, Feature, GeometryType, Header};
use serde::Serialize;
use wkt::ToWkt;

#[derive(Serialize)]
struct HeaderInfo<'a> {
    name: Option<&'a str>,
    geometry_type: GeometryType,
    dimensions: Dimensions,
    features_count: u64,
    index_node_size: u16,
    columns: &'a [ColumnMeta],
}

pub fn print_header<W: Write>(out: &mut W, header: &Header) -> Result<()> {
    let info = HeaderInfo {
        name: header.name.as_deref(),
        geometry_type: header.geometry_type,
        dimensions: header.dimensions(),
        features_count: header.features_count,
        index_node_size: header.index_node_size,
        columns: &header.columns,
    };
    serde_json::to_writer_pretty(&mut *out, &info)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_feature<W: Write>(out: &mut W, feature: &Feature) -> Result<()> {
    let line = serde_json::json!({
        "geometry": feature.geometry.as_ref().map(to_wkt),
        "properties": &feature.properties,
    });
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

/// Render a geometry as WKT
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}
