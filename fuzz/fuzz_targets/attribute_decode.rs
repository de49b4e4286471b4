#![no_main]

use geostream_core::{ColumnMeta, ColumnType};
use geostream_storage::{decode_properties, encode_properties};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let columns = vec![
        ColumnMeta::new("flag", ColumnType::Bool),
        ColumnMeta::new("id", ColumnType::Int),
        ColumnMeta::new("name", ColumnType::String),
        ColumnMeta::new("value", ColumnType::Double),
        ColumnMeta::new("when", ColumnType::DateTime),
    ];

    // Whatever decodes must encode again without error
    if let Ok(properties) = decode_properties(data, &columns) {
        let _ = encode_properties(&properties, &columns).unwrap();
    }
});
