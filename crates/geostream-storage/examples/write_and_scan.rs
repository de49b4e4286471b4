use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use geo_types::{point, Geometry};
use geostream_core::{ColumnMeta, ColumnType, Dimensions, Feature, GeometryType, Rect};
use geostream_storage::{FeatureReader, FeatureWriter, WriteConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let count: u32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let path = std::env::temp_dir().join("geostream_example.gst");

    let columns = vec![
        ColumnMeta::new("id", ColumnType::UInt),
        ColumnMeta::new("label", ColumnType::String),
    ];
    let config = WriteConfig {
        layer_name: Some("example points".to_string()),
        ..Default::default()
    };

    println!("\n📝 Writing {} points to {}", count, path.display());
    let mut writer = FeatureWriter::new(GeometryType::Point, Dimensions::Xy, columns, config);
    for i in 0..count {
        let x = (i % 100) as f64;
        let y = (i / 100) as f64;
        let feature = Feature::new(Some(Geometry::Point(point!(x: x, y: y))))
            .with_property("id", i)
            .with_property("label", format!("p{}", i));
        writer.add(&feature)?;
    }
    let mut out = BufWriter::new(File::create(&path)?);
    let header = writer.finish(&mut out)?;
    out.flush()?;
    drop(out);
    println!(
        "   ✅ {} features, index node size {}\n",
        header.features_count, header.index_node_size
    );

    let rect = Rect::new(10.0, 10.0, 12.0, 12.0);
    println!("🔍 Features intersecting {:?}", rect);
    let reader = FeatureReader::open(BufReader::new(File::open(&path)?))?;
    for feature in reader.select_bbox(rect)? {
        let feature = feature?;
        println!(
            "   {:?} {:?}",
            feature.property("label"),
            feature.geometry
        );
    }

    Ok(())
}
