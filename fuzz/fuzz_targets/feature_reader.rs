#![no_main]

use std::io::Cursor;

use geostream_core::Rect;
use geostream_storage::FeatureReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the reader:
    // - Invalid magic bytes or version
    // - Truncated or oversized header blocks
    // - Index blocks with child pointers outside their level
    // - Record lengths past the end of the stream
    // - Geometry part counts and nesting beyond the data
    // - Attribute tags outside the column list
    if let Ok(reader) = FeatureReader::open(Cursor::new(data)) {
        if let Ok(features) = reader.select_all() {
            for feature in features {
                let _ = feature;
            }
        }
    }

    if let Ok(reader) = FeatureReader::open(Cursor::new(data)) {
        let rect = Rect::new(-1e9, -1e9, 1e9, 1e9);
        if let Ok(features) = reader.select_bbox(rect) {
            for feature in features {
                let _ = feature;
            }
        }
    }
});
