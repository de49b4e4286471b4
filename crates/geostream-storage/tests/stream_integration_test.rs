//! Stream integration tests
//!
//! Write streams to real files, then read them back through every entry point.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use geo_types::{
    line_string, point, polygon, Geometry, GeometryCollection, MultiLineString, MultiPolygon,
};
use geostream_core::{
    ColumnMeta, ColumnType, Dimensions, Error, Feature, GeometryType, Properties, Rect, Result,
    Value,
};
use geostream_storage::{
    deserialize, deserialize_bytes, encode_header, serialize, write_feature, write_header,
    FeatureReader, FeatureWriter, WriteConfig,
};
use tempfile::TempDir;

fn city_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new("id", ColumnType::Int),
        ColumnMeta::new("name", ColumnType::String),
        ColumnMeta::new("capital", ColumnType::Bool),
        ColumnMeta::new("population", ColumnType::ULong),
    ]
}

/// 400 points on a 20 x 20 grid; every third one has no name
fn cities() -> Vec<Feature> {
    (0..400)
        .map(|i: i32| {
            let (x, y) = ((i % 20) as f64 * 0.5, (i / 20) as f64 * 0.5);
            let mut feature = Feature::new(Some(Geometry::Point(point!(x: x, y: y))))
                .with_property("id", i)
                .with_property("capital", i % 50 == 0)
                .with_property("population", (i as u64 + 1) * 1000);
            if i % 3 != 0 {
                feature.set_property("name", format!("city-{}", i));
            }
            feature
        })
        .collect()
}

fn write_indexed(path: &Path, features: &[Feature], node_size: u16) {
    let config = WriteConfig {
        index_node_size: node_size,
        layer_name: Some("cities".to_string()),
    };
    let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, city_columns(), config);
    for feature in features {
        writer.add(feature).unwrap();
    }
    let mut out = BufWriter::new(File::create(path).unwrap());
    writer.finish(&mut out).unwrap();
    out.flush().unwrap();
}

fn read_all(path: &Path, rect: Option<Rect>) -> Vec<Feature> {
    let file = BufReader::new(File::open(path).unwrap());
    deserialize(file, rect).unwrap().collect::<Result<_>>().unwrap()
}

fn id_of(feature: &Feature) -> i32 {
    match feature.property("id") {
        Some(Value::Int(id)) => *id,
        other => panic!("missing id: {:?}", other),
    }
}

fn sorted_ids(features: &[Feature]) -> Vec<i32> {
    let mut ids: Vec<i32> = features.iter().map(id_of).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_single_pass_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cities.gst");
    let features = cities();

    let mut out = BufWriter::new(File::create(&path).unwrap());
    let mut header = geostream_core::Header::new(GeometryType::Point, Dimensions::Xy, city_columns());
    header.features_count = features.len() as u64;
    write_header(&mut out, &header).unwrap();
    for feature in &features {
        write_feature(&mut out, feature, GeometryType::Point, Dimensions::Xy, &city_columns()).unwrap();
    }
    out.flush().unwrap();
    drop(out);

    assert_eq!(read_all(&path, None), features);
}

#[test]
fn test_sparse_names_stay_absent() {
    let bytes = serialize(&cities(), GeometryType::Point, Dimensions::Xy, Some(city_columns())).unwrap();
    let decoded = deserialize_bytes(&bytes).unwrap();

    for feature in &decoded {
        let id = id_of(feature);
        assert_eq!(feature.properties.contains_key("name"), id % 3 != 0);
    }
}

#[test]
fn test_full_scan_and_index_scan_agree() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cities-indexed.gst");
    let features = cities();
    write_indexed(&path, &features, 16);

    let covering = Rect::new(-1.0, -1.0, 100.0, 100.0);
    let full = read_all(&path, None);
    let indexed = read_all(&path, Some(covering));

    assert_eq!(full.len(), features.len());
    assert_eq!(sorted_ids(&full), sorted_ids(&indexed));
    assert_eq!(sorted_ids(&full), (0..400).collect::<Vec<_>>());
}

#[test]
fn test_index_scan_matches_brute_force() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cities-small-nodes.gst");
    let features = cities();
    write_indexed(&path, &features, 4);

    for rect in [
        Rect::new(1.0, 1.0, 2.0, 2.0),
        Rect::new(0.0, 0.0, 0.0, 0.0),
        Rect::new(9.5, 9.5, 20.0, 20.0),
        Rect::new(3.2, -5.0, 3.3, 50.0),
        Rect::new(50.0, 50.0, 60.0, 60.0),
    ] {
        let expected: Vec<i32> = {
            let mut ids: Vec<i32> = features
                .iter()
                .filter(|f| match &f.geometry {
                    Some(Geometry::Point(p)) => rect.intersects(&Rect::new(p.x(), p.y(), p.x(), p.y())),
                    _ => false,
                })
                .map(id_of)
                .collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(sorted_ids(&read_all(&path, Some(rect))), expected, "rect {:?}", rect);
    }
}

#[test]
fn test_layer_metadata_survives() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.gst");
    write_indexed(&path, &cities(), 16);

    let reader = FeatureReader::open(BufReader::new(File::open(&path).unwrap())).unwrap();
    let header = reader.header();
    assert_eq!(header.name.as_deref(), Some("cities"));
    assert_eq!(header.features_count, 400);
    assert_eq!(header.index_node_size, 16);
    assert_eq!(header.columns, city_columns());
}

#[test]
fn test_mixed_geometry_layer() {
    let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 0.0)];
    let features: Vec<Feature> = vec![
        Feature::new(Some(Geometry::Point(point!(x: 5.0, y: 5.0)))).with_property("kind", "point"),
        Feature::new(Some(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 9.0, y: 9.0)])))
            .with_property("kind", "line"),
        Feature::new(Some(Geometry::MultiPolygon(MultiPolygon::new(vec![square]))))
            .with_property("kind", "area"),
        Feature::new(None).with_property("kind", "nothing"),
    ];

    let bytes = serialize(&features, GeometryType::Unknown, Dimensions::Xy, None).unwrap();
    assert_eq!(deserialize_bytes(&bytes).unwrap(), features);
}

#[test]
fn test_empty_multilinestring_survives_file() {
    let empty = Geometry::MultiLineString(MultiLineString::new(vec![]));
    let features: Vec<Feature> = vec![
        Feature::new(Some(empty.clone())).with_property("kind", "bare"),
        Feature::new(Some(Geometry::GeometryCollection(GeometryCollection::new_from(vec![empty]))))
            .with_property("kind", "nested"),
    ];

    let bytes = serialize(&features, GeometryType::Unknown, Dimensions::Xy, None).unwrap();
    assert_eq!(deserialize_bytes(&bytes).unwrap(), features);
}

#[test]
fn test_corrupt_tag_stops_without_partial_feature() {
    let columns = vec![ColumnMeta::new("id", ColumnType::Int)];
    let good: Feature = Feature::new(None).with_property("id", 1i32);
    let mut bytes = serialize(&[good.clone(), good.clone()], GeometryType::Point, Dimensions::Xy, Some(columns))
        .unwrap();

    // Last record: len u32 | flags | attr len u32 | tag u16 | i32 -> tag sits 6 bytes from the end
    let tag_at = bytes.len() - 6;
    bytes[tag_at] = 9;

    let results: Vec<Result<Feature>> = deserialize(std::io::Cursor::new(&bytes[..]), None)
        .unwrap()
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &good);
    assert!(matches!(results[1], Err(Error::Schema { tag: 9, column_count: 1 })));
}

#[test]
fn test_empty_properties_have_no_block() {
    let columns = vec![ColumnMeta::new("id", ColumnType::Int)];
    let feature: Feature = Feature::with_properties(
        Some(Geometry::Point(point!(x: 1.0, y: 1.0))),
        Properties::new(),
    );
    let bytes = serialize(&[feature.clone()], GeometryType::Point, Dimensions::Xy, Some(columns)).unwrap();
    let header_len = encode_header(&geostream_core::Header {
        features_count: 1,
        ..geostream_core::Header::new(
            GeometryType::Point,
            Dimensions::Xy,
            vec![ColumnMeta::new("id", ColumnType::Int)],
        )
    })
    .unwrap()
    .len();

    // flags byte right after the record length has only the geometry bit
    assert_eq!(bytes[header_len + 4], 0b01);
    assert_eq!(deserialize_bytes(&bytes).unwrap(), vec![feature]);
}

#[test]
fn test_bad_magic_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-stream.gst");
    std::fs::write(&path, b"PK\x03\x04 this is a zip, not a stream").unwrap();

    let result = FeatureReader::open(BufReader::new(File::open(&path).unwrap()));
    assert!(matches!(result, Err(Error::InvalidMagic)));
}

#[test]
fn test_truncated_index_block() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.gst");
    write_indexed(&path, &cities(), 16);

    let reader = FeatureReader::open(BufReader::new(File::open(&path).unwrap())).unwrap();
    let header = reader.header().clone();
    drop(reader);

    // Keep the header and only part of the index
    let bytes = std::fs::read(&path).unwrap();
    let header_len = encode_header(&header).unwrap().len();
    std::fs::write(&path, &bytes[..header_len + 100]).unwrap();

    let reader = FeatureReader::open(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert!(reader.select_all().is_err());

    let reader = FeatureReader::open(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert!(reader.select_bbox(Rect::new(0.0, 0.0, 1.0, 1.0)).is_err());
}

#[test]
fn test_dimension_flags_on_disk() {
    for (dimensions, has_z, has_m) in [
        (Dimensions::Xy, false, false),
        (Dimensions::Xyz, true, false),
        (Dimensions::Xym, false, true),
    ] {
        let bytes = serialize(&[], GeometryType::Point, dimensions, Some(vec![])).unwrap();
        let reader = FeatureReader::open(std::io::Cursor::new(&bytes[..])).unwrap();
        assert_eq!(reader.header().has_z, has_z);
        assert_eq!(reader.header().has_m, has_m);
        assert_eq!(reader.header().dimensions(), dimensions);
    }
}
